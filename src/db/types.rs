use serde::{Deserialize, Serialize};
use sqlx::Type;

/// How a fixture exercises the submission: fed on stdin, or invoked through
/// the fixed entry point with serialized arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "teststyle", rename_all = "lowercase")]
pub(crate) enum TestStyle {
    Stdin,
    Exec,
}

/// Terminal state of one grading attempt. `Graded` means the harness produced
/// a parsable result document, regardless of how many tests passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptoutcome", rename_all = "snake_case")]
pub(crate) enum AttemptOutcome {
    Graded,
    TimedOut,
    InfraError,
}

impl AttemptOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Graded => "graded",
            Self::TimedOut => "timed_out",
            Self::InfraError => "infra_error",
        }
    }
}

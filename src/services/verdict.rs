use thiserror::Error;

use crate::harness::report::HarnessReport;

pub(crate) const NO_TESTS_WARNING: &str = "question has no hidden test cases";

#[derive(Debug, Error)]
pub(crate) enum VerdictError {
    #[error("unparsable harness output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strict parse of the harness stdout document. A failure here means the
/// attempt could not be graded; it is never read as "zero tests passed".
pub(crate) fn interpret(raw: &str) -> Result<HarnessReport, VerdictError> {
    Ok(serde_json::from_str(raw.trim())?)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scorecard {
    pub(crate) fraction: f64,
    pub(crate) score: f64,
    pub(crate) completed: bool,
    pub(crate) config_warning: Option<&'static str>,
}

/// Pure scoring: the same report and weight always produce the same card.
/// A question with no hidden cases scores zero and stays incomplete so a
/// misconfiguration can never read as a satisfied activity.
pub(crate) fn score(report: &HarnessReport, weight: i32) -> Scorecard {
    let summary = &report.summary;
    if summary.total == 0 {
        return Scorecard {
            fraction: 0.0,
            score: 0.0,
            completed: false,
            config_warning: Some(NO_TESTS_WARNING),
        };
    }

    let fraction = f64::from(summary.passed) / f64::from(summary.total);
    Scorecard {
        fraction,
        score: f64::from(weight) * fraction,
        completed: summary.all_passed,
        config_warning: None,
    }
}

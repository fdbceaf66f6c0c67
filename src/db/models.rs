use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptOutcome, TestStyle};
use crate::harness::report::{ReportSummary, TestReport};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CodeQuestion {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) starter_code: Option<String>,
    pub(crate) language: String,
    pub(crate) question_type: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CodeTestCase {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) input_data: String,
    pub(crate) expected_output: String,
    pub(crate) is_hidden: bool,
    pub(crate) order_index: i32,
    pub(crate) test_style: TestStyle,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Activity {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) question_id: String,
    pub(crate) weight: i32,
    pub(crate) allow_resubmission: bool,
    pub(crate) language: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One ledger entry. Rows are append-only; a resubmission appends a new row
/// instead of touching an old one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) activity_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) outcome: AttemptOutcome,
    pub(crate) completed: bool,
    pub(crate) graded: bool,
    pub(crate) score: Option<f64>,
    pub(crate) date_completed: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CodeSubmission {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) code: String,
    pub(crate) code_sha256: String,
    pub(crate) results: Json<Vec<TestReport>>,
    pub(crate) summary: Option<Json<ReportSummary>>,
    pub(crate) error: Option<String>,
    pub(crate) runtime_ms: Option<i64>,
    pub(crate) created_at: PrimitiveDateTime,
}

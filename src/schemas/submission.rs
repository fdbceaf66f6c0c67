use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Attempt, CodeSubmission};
use crate::db::types::AttemptOutcome;
use crate::harness::report::{ReportSummary, TestReport};
use crate::services::grading::GradedAttempt;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitCodeRequest {
    #[serde(alias = "activityId")]
    #[validate(length(min = 1, message = "activity_id must not be empty"))]
    pub(crate) activity_id: String,
    #[validate(length(min = 1, message = "code must not be empty"))]
    pub(crate) code: String,
}

/// One recorded attempt with its per-test breakdown. `reused` is true only
/// on the submit endpoint, when a disallowed resubmission returned the
/// stored attempt instead of running the sandbox.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) activity_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) outcome: AttemptOutcome,
    pub(crate) completed: bool,
    pub(crate) graded: bool,
    pub(crate) score: Option<f64>,
    pub(crate) date_completed: String,
    pub(crate) summary: Option<ReportSummary>,
    pub(crate) results: Vec<TestReport>,
    pub(crate) detail: Option<String>,
    pub(crate) reused: bool,
}

impl AttemptResponse {
    pub(crate) fn from_record(attempt: Attempt, submission: CodeSubmission, reused: bool) -> Self {
        Self {
            attempt_id: attempt.id,
            activity_id: attempt.activity_id,
            attempt_number: attempt.attempt_number,
            outcome: attempt.outcome,
            completed: attempt.completed,
            graded: attempt.graded,
            score: attempt.score,
            date_completed: format_primitive(attempt.date_completed),
            summary: submission.summary.map(|summary| summary.0),
            results: submission.results.0,
            detail: submission.error,
            reused,
        }
    }
}

impl From<GradedAttempt> for AttemptResponse {
    fn from(graded: GradedAttempt) -> Self {
        Self::from_record(graded.attempt, graded.submission, graded.reused)
    }
}

/// Compact attempt view for histories and rollups; no per-test payload.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptRef {
    pub(crate) attempt_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) outcome: AttemptOutcome,
    pub(crate) completed: bool,
    pub(crate) graded: bool,
    pub(crate) score: Option<f64>,
    pub(crate) date_completed: String,
}

impl From<Attempt> for AttemptRef {
    fn from(attempt: Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            attempt_number: attempt.attempt_number,
            outcome: attempt.outcome,
            completed: attempt.completed,
            graded: attempt.graded,
            score: attempt.score,
            date_completed: format_primitive(attempt.date_completed),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptListResponse {
    pub(crate) activity_id: String,
    pub(crate) attempts: Vec<AttemptRef>,
}

/// The activity rollup. The score of record is the highest graded score;
/// `completed` turns true once any attempt completed.
#[derive(Debug, Serialize)]
pub(crate) struct ActivityResultResponse {
    pub(crate) activity_id: String,
    pub(crate) attempts_count: i64,
    pub(crate) score_of_record: Option<f64>,
    pub(crate) completed: bool,
    pub(crate) best: Option<AttemptRef>,
    pub(crate) latest: Option<AttemptRef>,
}

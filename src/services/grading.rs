use std::path::Path;
use std::time::Instant;

use sha2::{Digest, Sha256};
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::{millis_i64, primitive_now_utc};
use crate::db::models::{Activity, Attempt, CodeSubmission, CodeTestCase};
use crate::db::types::AttemptOutcome;
use crate::harness::languages::{Language, SUPPORTED_LANGUAGES};
use crate::harness::report::{ReportSummary, TestReport};
use crate::repositories;
use crate::services::sandbox::SandboxRun;
use crate::services::{fixtures, sandbox, verdict};

const ATTEMPT_INSERT_RETRIES: usize = 5;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("{0}")]
    Validation(String),
    #[error("activity not found: {0}")]
    ActivityNotFound(String),
    #[error("question not found: {0}")]
    QuestionNotFound(String),
    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("attempt numbering did not settle after {0} tries")]
    NumberingContention(usize),
}

pub(crate) struct GradeRequest {
    pub(crate) student_id: String,
    pub(crate) activity_id: String,
    pub(crate) code: String,
}

pub(crate) struct GradedAttempt {
    pub(crate) attempt: Attempt,
    pub(crate) submission: CodeSubmission,
    /// True when a disallowed resubmission returned the stored attempt
    /// instead of running the sandbox.
    pub(crate) reused: bool,
}

/// What one sandbox invocation produced, before it reaches the ledger.
enum RunOutcome {
    Graded { results: Vec<TestReport>, summary: ReportSummary, duration_ms: i64 },
    TimedOut { duration_ms: i64 },
    Infra { detail: String, duration_ms: Option<i64> },
}

/// The whole grading pipeline for one submission: validate, short-circuit,
/// stage, dispatch, interpret, record. Validation failures leave no trace in
/// the ledger; everything after dispatch is recorded, graded or not.
pub(crate) async fn submit(
    state: &AppState,
    request: GradeRequest,
) -> Result<GradedAttempt, GradingError> {
    if request.code.trim().is_empty() {
        return Err(GradingError::Validation("code must not be empty".to_string()));
    }
    let max_code_bytes = state.settings().grading().max_code_bytes;
    if request.code.len() as u64 > max_code_bytes {
        return Err(GradingError::Validation(format!(
            "code exceeds the {max_code_bytes} byte limit"
        )));
    }

    let activity = repositories::activities::find_by_id(state.db(), &request.activity_id)
        .await?
        .ok_or_else(|| GradingError::ActivityNotFound(request.activity_id.clone()))?;

    let language = Language::from_name(&activity.language).ok_or_else(|| {
        GradingError::Validation(format!(
            "unsupported language {} (supported: {})",
            activity.language,
            SUPPORTED_LANGUAGES.join(", ")
        ))
    })?;

    let question = repositories::questions::find_by_id(state.db(), &activity.question_id)
        .await?
        .ok_or_else(|| GradingError::QuestionNotFound(activity.question_id.clone()))?;

    if !activity.allow_resubmission {
        if let Some(existing) =
            repositories::attempts::find_completed(state.db(), &request.student_id, &activity.id)
                .await?
        {
            tracing::info!(
                student_id = %request.student_id,
                activity_id = %activity.id,
                attempt_number = existing.attempt_number,
                "resubmission disallowed; returning recorded attempt"
            );
            metrics::counter!("grading_jobs_total", "status" => "short_circuit").increment(1);

            let submission =
                repositories::submissions::find_by_attempt(state.db(), &existing.id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
            return Ok(GradedAttempt { attempt: existing, submission, reused: true });
        }
    }

    let cases = repositories::questions::list_hidden_ordered(state.db(), &question.id).await?;
    if cases.is_empty() {
        tracing::warn!(question_id = %question.id, "question has no hidden test cases");
    }

    let outcome = run_sandboxed(state, language, &request.code, &cases).await;
    record(state, &activity, request, outcome).await
}

async fn run_sandboxed(
    state: &AppState,
    language: Language,
    code: &str,
    cases: &[CodeTestCase],
) -> RunOutcome {
    let settings = state.settings().sandbox();

    let wait_started = Instant::now();
    let _permit = match state.sandbox_permits().acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return RunOutcome::Infra {
                detail: "sandbox limiter is closed".to_string(),
                duration_ms: None,
            }
        }
    };
    metrics::histogram!("sandbox_wait_seconds").record(wait_started.elapsed().as_secs_f64());

    let workspace =
        match fixtures::stage(Path::new(&settings.workspace_root), language, code, cases).await {
            Ok(workspace) => workspace,
            Err(err) => {
                tracing::error!(error = %err, "fixture staging failed");
                return RunOutcome::Infra {
                    detail: format!("staging failed: {err}"),
                    duration_ms: None,
                };
            }
        };

    match sandbox::run(settings, &workspace, language).await {
        Ok(SandboxRun::Completed { stdout, stderr, exit_ok, duration }) => {
            let duration_ms = millis_i64(duration);
            if !exit_ok {
                let stderr = stderr.trim();
                let detail = if stderr.is_empty() {
                    "sandbox exited with failure".to_string()
                } else {
                    format!("sandbox exited with failure: {stderr}")
                };
                tracing::error!(workspace = %workspace.id(), detail = %detail, "sandbox run failed");
                return RunOutcome::Infra { detail, duration_ms: Some(duration_ms) };
            }

            match verdict::interpret(&stdout) {
                Ok(report) => RunOutcome::Graded {
                    results: report.results,
                    summary: report.summary,
                    duration_ms,
                },
                Err(err) => {
                    tracing::error!(workspace = %workspace.id(), error = %err, "unparsable harness output");
                    RunOutcome::Infra {
                        detail: format!("unparsable harness output: {err}"),
                        duration_ms: Some(duration_ms),
                    }
                }
            }
        }
        Ok(SandboxRun::TimedOut { duration }) => {
            tracing::warn!(workspace = %workspace.id(), "sandbox wall timeout");
            RunOutcome::TimedOut { duration_ms: millis_i64(duration) }
        }
        Err(err) => {
            tracing::error!(error = %err, "sandbox dispatch failed");
            RunOutcome::Infra { detail: err.to_string(), duration_ms: None }
        }
    }
}

struct LedgerEntry {
    outcome: AttemptOutcome,
    completed: bool,
    graded: bool,
    score: Option<f64>,
    results: Vec<TestReport>,
    summary: Option<ReportSummary>,
    error: Option<String>,
    runtime_ms: Option<i64>,
}

fn ledger_entry(activity: &Activity, outcome: RunOutcome) -> LedgerEntry {
    match outcome {
        RunOutcome::Graded { results, summary, duration_ms } => {
            let report = crate::harness::report::HarnessReport { results, summary };
            let card = verdict::score(&report, activity.weight);
            LedgerEntry {
                outcome: AttemptOutcome::Graded,
                completed: card.completed,
                graded: true,
                score: Some(card.score),
                results: report.results,
                summary: Some(report.summary),
                error: card.config_warning.map(str::to_string),
                runtime_ms: Some(duration_ms),
            }
        }
        RunOutcome::TimedOut { duration_ms } => LedgerEntry {
            outcome: AttemptOutcome::TimedOut,
            completed: false,
            graded: false,
            score: None,
            results: Vec::new(),
            summary: None,
            error: Some("execution timed out".to_string()),
            runtime_ms: Some(duration_ms),
        },
        RunOutcome::Infra { detail, duration_ms } => LedgerEntry {
            outcome: AttemptOutcome::InfraError,
            completed: false,
            graded: false,
            score: None,
            results: Vec::new(),
            summary: None,
            error: Some(detail),
            runtime_ms: duration_ms,
        },
    }
}

/// Appends the attempt and its submission in one transaction. On attempt
/// number contention the whole transaction restarts.
async fn record(
    state: &AppState,
    activity: &Activity,
    request: GradeRequest,
    outcome: RunOutcome,
) -> Result<GradedAttempt, GradingError> {
    let entry = ledger_entry(activity, outcome);
    let now = primitive_now_utc();
    let code_sha256 = hex::encode(Sha256::digest(request.code.as_bytes()));
    let results_json = serde_json::to_value(&entry.results)?;
    let summary_json = entry.summary.as_ref().map(serde_json::to_value).transpose()?;

    for _ in 0..ATTEMPT_INSERT_RETRIES {
        let mut tx = state.db().begin().await?;

        let attempt_id = Uuid::new_v4().to_string();
        let inserted = repositories::attempts::insert_numbered(
            &mut *tx,
            repositories::attempts::CreateAttempt {
                id: &attempt_id,
                student_id: &request.student_id,
                activity_id: &activity.id,
                outcome: entry.outcome,
                completed: entry.completed,
                graded: entry.graded,
                score: entry.score,
                date_completed: now,
                created_at: now,
            },
        )
        .await;

        let attempt_number = match inserted {
            Ok(number) => number,
            Err(err) if repositories::attempts::is_unique_violation(&err) => {
                tx.rollback().await?;
                tracing::debug!(
                    student_id = %request.student_id,
                    activity_id = %activity.id,
                    "attempt number contention; retrying"
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let submission_id = Uuid::new_v4().to_string();
        repositories::submissions::create(
            &mut *tx,
            repositories::submissions::CreateSubmission {
                id: &submission_id,
                attempt_id: &attempt_id,
                code: &request.code,
                code_sha256: &code_sha256,
                results: results_json.clone(),
                summary: summary_json.clone(),
                error: entry.error.as_deref(),
                runtime_ms: entry.runtime_ms,
                created_at: now,
            },
        )
        .await?;

        tx.commit().await?;

        metrics::counter!("grading_jobs_total", "status" => entry.outcome.as_str()).increment(1);
        if let Some(runtime_ms) = entry.runtime_ms {
            metrics::histogram!("grading_duration_seconds").record(runtime_ms as f64 / 1000.0);
        }

        tracing::info!(
            student_id = %request.student_id,
            activity_id = %activity.id,
            attempt_number,
            outcome = entry.outcome.as_str(),
            score = entry.score,
            "attempt recorded"
        );

        let attempt = Attempt {
            id: attempt_id.clone(),
            student_id: request.student_id,
            activity_id: activity.id.clone(),
            attempt_number,
            outcome: entry.outcome,
            completed: entry.completed,
            graded: entry.graded,
            score: entry.score,
            date_completed: now,
            created_at: now,
        };
        let submission = CodeSubmission {
            id: submission_id,
            attempt_id,
            code: request.code,
            code_sha256,
            results: Json(entry.results),
            summary: entry.summary.map(Json),
            error: entry.error,
            runtime_ms: entry.runtime_ms,
            created_at: now,
        };

        return Ok(GradedAttempt { attempt, submission, reused: false });
    }

    Err(GradingError::NumberingContention(ATTEMPT_INSERT_RETRIES))
}

use crate::db::models::Attempt;
use crate::db::types::AttemptOutcome;

pub(crate) const COLUMNS: &str = "\
    id, student_id, activity_id, attempt_number, outcome, \
    completed, graded, score, date_completed, created_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) activity_id: &'a str,
    pub(crate) outcome: AttemptOutcome,
    pub(crate) completed: bool,
    pub(crate) graded: bool,
    pub(crate) score: Option<f64>,
    pub(crate) date_completed: time::PrimitiveDateTime,
    pub(crate) created_at: time::PrimitiveDateTime,
}

/// Inserts the attempt with its number computed inside the statement, so
/// numbering is never a separate read. Two racing inserts for the same
/// (student, activity) compute the same number; the unique constraint
/// rejects one and the caller restarts its transaction.
pub(crate) async fn insert_numbered(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO attempts (
            id, student_id, activity_id, attempt_number, outcome,
            completed, graded, score, date_completed, created_at
        )
        SELECT $1, $2, $3, COALESCE(MAX(attempt_number), 0) + 1, $4, $5, $6, $7, $8, $9
        FROM attempts WHERE student_id = $2 AND activity_id = $3
        RETURNING attempt_number",
    )
    .bind(attempt.id)
    .bind(attempt.student_id)
    .bind(attempt.activity_id)
    .bind(attempt.outcome)
    .bind(attempt.completed)
    .bind(attempt.graded)
    .bind(attempt.score)
    .bind(attempt.date_completed)
    .bind(attempt.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Latest completed attempt, used by the resubmission short-circuit.
pub(crate) async fn find_completed(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    activity_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE student_id = $1 AND activity_id = $2 AND completed = TRUE \
         ORDER BY attempt_number DESC LIMIT 1"
    ))
    .bind(student_id)
    .bind(activity_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_latest(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    activity_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE student_id = $1 AND activity_id = $2 \
         ORDER BY attempt_number DESC LIMIT 1"
    ))
    .bind(student_id)
    .bind(activity_id)
    .fetch_optional(executor)
    .await
}

/// Highest-scoring graded attempt; ties resolve to the earliest attempt
/// that reached the score.
pub(crate) async fn find_best(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    activity_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE student_id = $1 AND activity_id = $2 AND graded = TRUE \
         ORDER BY score DESC NULLS LAST, attempt_number ASC LIMIT 1"
    ))
    .bind(student_id)
    .bind(activity_id)
    .fetch_optional(executor)
    .await
}

/// Full history, newest first.
pub(crate) async fn list_for_activity(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    activity_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE student_id = $1 AND activity_id = $2 \
         ORDER BY attempt_number DESC"
    ))
    .bind(student_id)
    .bind(activity_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_for_activity(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    activity_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE student_id = $1 AND activity_id = $2")
        .bind(student_id)
        .bind(activity_id)
        .fetch_one(executor)
        .await
}

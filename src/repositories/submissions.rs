use crate::db::models::CodeSubmission;

pub(crate) const COLUMNS: &str =
    "id, attempt_id, code, code_sha256, results, summary, error, runtime_ms, created_at";

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) code: &'a str,
    pub(crate) code_sha256: &'a str,
    pub(crate) results: serde_json::Value,
    pub(crate) summary: Option<serde_json::Value>,
    pub(crate) error: Option<&'a str>,
    pub(crate) runtime_ms: Option<i64>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    submission: CreateSubmission<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO code_submissions (
            id, attempt_id, code, code_sha256, results, summary, error, runtime_ms, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(submission.id)
    .bind(submission.attempt_id)
    .bind(submission.code)
    .bind(submission.code_sha256)
    .bind(submission.results)
    .bind(submission.summary)
    .bind(submission.error)
    .bind(submission.runtime_ms)
    .bind(submission.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn find_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<CodeSubmission>, sqlx::Error> {
    sqlx::query_as::<_, CodeSubmission>(&format!(
        "SELECT {COLUMNS} FROM code_submissions WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

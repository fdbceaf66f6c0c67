use crate::db::models::Activity;

pub(crate) const COLUMNS: &str =
    "id, title, question_id, weight, allow_resubmission, language, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Activity>, sqlx::Error> {
    sqlx::query_as::<_, Activity>(&format!("SELECT {COLUMNS} FROM activities WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

use crate::db::models::{CodeQuestion, CodeTestCase};

pub(crate) const COLUMNS: &str =
    "id, prompt, starter_code, language, question_type, created_at, updated_at";

pub(crate) const CASE_COLUMNS: &str =
    "id, question_id, input_data, expected_output, is_hidden, order_index, test_style, created_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<CodeQuestion>, sqlx::Error> {
    sqlx::query_as::<_, CodeQuestion>(&format!("SELECT {COLUMNS} FROM code_questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Hidden cases only; visible samples never participate in grading.
pub(crate) async fn list_hidden_ordered(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<Vec<CodeTestCase>, sqlx::Error> {
    sqlx::query_as::<_, CodeTestCase>(&format!(
        "SELECT {CASE_COLUMNS} FROM code_test_cases \
         WHERE question_id = $1 AND is_hidden = TRUE \
         ORDER BY order_index"
    ))
    .bind(question_id)
    .fetch_all(executor)
    .await
}

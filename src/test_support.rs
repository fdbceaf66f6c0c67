use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api;
use crate::api::guards::STUDENT_ID_HEADER;
use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::types::TestStyle;

pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("GRADECELL_ENV", "test");
    std::env::set_var("GRADECELL_STRICT_CONFIG", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("SANDBOX_DOCKER_BIN");
    std::env::remove_var("SANDBOX_WORKSPACE_ROOT");
    std::env::remove_var("SANDBOX_WALL_TIMEOUT_SECS");
}

/// Connects to the opt-in test database, applies migrations and starts from
/// clean tables. Callers return early when the variable is unset, so the
/// default suite runs without any infrastructure.
pub(crate) async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL is not set; skipping database test");
            return None;
        }
    };

    let pool =
        PgPoolOptions::new().max_connections(4).connect(&url).await.expect("test database");
    crate::db::run_migrations(&pool).await.expect("migrations");
    reset_db(&pool).await.expect("reset db");
    Some(pool)
}

pub(crate) async fn reset_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "TRUNCATE code_submissions, attempts, code_test_cases, activities, code_questions \
         RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _sandbox_dir: tempfile::TempDir,
    _guard: MutexGuard<'static, ()>,
}

/// Full-stack context for the submit pipeline: the container CLI is replaced
/// by a stub script so grading runs without Docker. Returns `None` when the
/// test database is not configured.
#[cfg(unix)]
pub(crate) async fn setup_grading_context(stub_script: &str) -> Option<TestContext> {
    setup_grading_context_with_wall_timeout(stub_script, 10).await
}

#[cfg(unix)]
pub(crate) async fn setup_grading_context_with_wall_timeout(
    stub_script: &str,
    wall_timeout_secs: u64,
) -> Option<TestContext> {
    use std::os::unix::fs::PermissionsExt;

    let guard = env_lock();
    set_test_env();

    let sandbox_dir = tempfile::tempdir().expect("tempdir");
    let stub = sandbox_dir.path().join("docker-stub");
    std::fs::write(&stub, stub_script).expect("stub script");
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let workspace_root = sandbox_dir.path().join("work");
    std::fs::create_dir_all(&workspace_root).expect("workspace root");
    std::env::set_var("SANDBOX_DOCKER_BIN", &stub);
    std::env::set_var("SANDBOX_WORKSPACE_ROOT", &workspace_root);
    std::env::set_var("SANDBOX_WALL_TIMEOUT_SECS", wall_timeout_secs.to_string());

    let pool = test_pool().await?;
    let settings = Settings::load().expect("settings");
    let state = AppState::new(settings, pool);
    let app = api::router::router(state.clone());

    Some(TestContext { state, app, _sandbox_dir: sandbox_dir, _guard: guard })
}

pub(crate) async fn insert_question(pool: &PgPool, id: &str, language: &str) {
    let now = primitive_now_utc();
    sqlx::query(
        "INSERT INTO code_questions (id, prompt, starter_code, language, question_type, \
         created_at, updated_at) VALUES ($1, $2, NULL, $3, 'code', $4, $4)",
    )
    .bind(id)
    .bind("Echo the input")
    .bind(language)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert question");
}

pub(crate) async fn insert_hidden_case(
    pool: &PgPool,
    question_id: &str,
    order_index: i32,
    input: &str,
    expected: &str,
    style: TestStyle,
) {
    sqlx::query(
        "INSERT INTO code_test_cases (id, question_id, input_data, expected_output, is_hidden, \
         order_index, test_style, created_at) VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(question_id)
    .bind(input)
    .bind(expected)
    .bind(order_index)
    .bind(style)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert test case");
}

pub(crate) async fn insert_activity(
    pool: &PgPool,
    id: &str,
    question_id: &str,
    language: &str,
    weight: i32,
    allow_resubmission: bool,
) {
    let now = primitive_now_utc();
    sqlx::query(
        "INSERT INTO activities (id, title, question_id, weight, allow_resubmission, language, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
    )
    .bind(id)
    .bind("Echo exercise")
    .bind(question_id)
    .bind(weight)
    .bind(allow_resubmission)
    .bind(language)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert activity");
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    student_id: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(student_id) = student_id {
        builder = builder.header(STUDENT_ID_HEADER, student_id);
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::submission::{
    ActivityResultResponse, AttemptListResponse, AttemptRef, AttemptResponse, SubmitCodeRequest,
};
use crate::services::grading::{self, GradeRequest};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_code))
        .route("/attempts/:attempt_id", get(get_attempt))
        .route("/activities/:activity_id/attempts", get(list_attempts))
        .route("/activities/:activity_id/result", get(get_activity_result))
}

/// Grades one submission end to end and returns the recorded attempt.
/// Returns 200 instead of 201 when a disallowed resubmission short-circuits
/// to the already-recorded attempt.
async fn submit_code(
    CurrentStudent(student_id): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmitCodeRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    let graded = grading::submit(
        &state,
        GradeRequest { student_id, activity_id: payload.activity_id, code: payload.code },
    )
    .await?;

    let status = if graded.reused { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(AttemptResponse::from(graded))))
}

async fn get_attempt(
    CurrentStudent(student_id): CurrentStudent,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound(format!("attempt not found: {attempt_id}")))?;

    // Other students' attempts do not exist as far as the caller can tell.
    if attempt.student_id != student_id {
        return Err(ApiError::NotFound(format!("attempt not found: {attempt_id}")));
    }

    let submission = repositories::submissions::find_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::internal("no submission row", "Attempt has no submission"))?;

    Ok(Json(AttemptResponse::from_record(attempt, submission, false)))
}

async fn list_attempts(
    CurrentStudent(student_id): CurrentStudent,
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
) -> Result<Json<AttemptListResponse>, ApiError> {
    require_activity(&state, &activity_id).await?;

    let attempts =
        repositories::attempts::list_for_activity(state.db(), &student_id, &activity_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(AttemptListResponse {
        activity_id,
        attempts: attempts.into_iter().map(AttemptRef::from).collect(),
    }))
}

/// The activity rollup: the highest graded score is the score of record,
/// alongside the most recent attempt for display.
async fn get_activity_result(
    CurrentStudent(student_id): CurrentStudent,
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
) -> Result<Json<ActivityResultResponse>, ApiError> {
    require_activity(&state, &activity_id).await?;

    let best = repositories::attempts::find_best(state.db(), &student_id, &activity_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch best attempt"))?;
    let latest = repositories::attempts::find_latest(state.db(), &student_id, &activity_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch latest attempt"))?;
    let completed =
        repositories::attempts::find_completed(state.db(), &student_id, &activity_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch completed attempt"))?;
    let attempts_count =
        repositories::attempts::count_for_activity(state.db(), &student_id, &activity_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    Ok(Json(ActivityResultResponse {
        activity_id,
        attempts_count,
        score_of_record: best.as_ref().and_then(|attempt| attempt.score),
        completed: completed.is_some(),
        best: best.map(AttemptRef::from),
        latest: latest.map(AttemptRef::from),
    }))
}

async fn require_activity(state: &AppState, activity_id: &str) -> Result<(), ApiError> {
    repositories::activities::find_by_id(state.db(), activity_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch activity"))?
        .ok_or_else(|| ApiError::NotFound(format!("activity not found: {activity_id}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::types::TestStyle;
    use crate::repositories;
    use crate::test_support::{self, json_request, read_json};

    const HALF_PASS_STUB: &str = r#"#!/bin/sh
echo '{"results": [{"test": "1", "passed": true, "expected": "2", "actual": "2", "error": ""}, {"test": "2", "passed": false, "expected": "4", "actual": "5", "error": ""}], "summary": {"passed": 1, "total": 2, "all_passed": false}}'
"#;

    const ALL_PASS_STUB: &str = r#"#!/bin/sh
echo '{"results": [{"test": "1", "passed": true, "expected": "2", "actual": "2", "error": ""}, {"test": "2", "passed": true, "expected": "4", "actual": "4", "error": ""}], "summary": {"passed": 2, "total": 2, "all_passed": true}}'
"#;

    const FAILING_STUB: &str = r#"#!/bin/sh
echo 'runner image missing' >&2
exit 125
"#;

    const HANGING_STUB: &str = r#"#!/bin/sh
if [ "$1" = kill ]; then exit 0; fi
sleep 30
"#;

    async fn seed(pool: &sqlx::PgPool, language: &str, allow_resubmission: bool) -> String {
        let question_id = uuid::Uuid::new_v4().to_string();
        let activity_id = uuid::Uuid::new_v4().to_string();
        test_support::insert_question(pool, &question_id, language).await;
        test_support::insert_hidden_case(pool, &question_id, 1, "1", "2", TestStyle::Stdin).await;
        test_support::insert_hidden_case(pool, &question_id, 2, "2", "4", TestStyle::Stdin).await;
        test_support::insert_activity(pool, &activity_id, &question_id, language, 10, allow_resubmission)
            .await;
        activity_id
    }

    fn submit_body(activity_id: &str) -> serde_json::Value {
        serde_json::json!({"activity_id": activity_id, "code": "print(int(input()) * 2)"})
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submit_grades_and_records_the_attempt() {
        let Some(context) = test_support::setup_grading_context(HALF_PASS_STUB).await else {
            return;
        };
        let activity_id = seed(context.state.db(), "python", true).await;

        let response = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["attempt_number"], 1);
        assert_eq!(body["outcome"], "graded");
        assert_eq!(body["graded"], true);
        assert_eq!(body["completed"], false);
        assert_eq!(body["score"], 5.0);
        assert_eq!(body["summary"]["passed"], 1);
        assert_eq!(body["results"].as_array().map(|results| results.len()), Some(2));
        assert_eq!(body["reused"], false);

        // The attempt is readable by its owner and invisible to anyone else.
        let attempt_id = body["attempt_id"].as_str().expect("attempt id").to_string();
        let mine = context
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/attempts/{attempt_id}"),
                Some("student-1"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(mine.status(), StatusCode::OK);

        let theirs = context
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/attempts/{attempt_id}"),
                Some("student-2"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(theirs.status(), StatusCode::NOT_FOUND);

        let rollup = context
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/activities/{activity_id}/result"),
                Some("student-1"),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(rollup.status(), StatusCode::OK);
        let rollup = read_json(rollup).await;
        assert_eq!(rollup["attempts_count"], 1);
        assert_eq!(rollup["score_of_record"], 5.0);
        assert_eq!(rollup["completed"], false);
        assert_eq!(rollup["latest"]["attempt_number"], 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resubmission_short_circuits_when_disallowed() {
        let Some(context) = test_support::setup_grading_context(ALL_PASS_STUB).await else {
            return;
        };
        let activity_id = seed(context.state.db(), "python", false).await;

        let first = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::CREATED);
        let first = read_json(first).await;
        assert_eq!(first["completed"], true);

        let second = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::OK);
        let second = read_json(second).await;
        assert_eq!(second["reused"], true);
        assert_eq!(second["attempt_number"], 1);
        assert_eq!(second["attempt_id"], first["attempt_id"]);

        let count =
            repositories::attempts::count_for_activity(context.state.db(), "student-1", &activity_id)
                .await
                .expect("count");
        assert_eq!(count, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sandbox_failure_records_an_infra_error_attempt() {
        let Some(context) = test_support::setup_grading_context(FAILING_STUB).await else {
            return;
        };
        let activity_id = seed(context.state.db(), "python", true).await;

        let response = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["outcome"], "infra_error");
        assert_eq!(body["graded"], false);
        assert_eq!(body["completed"], false);
        assert!(body["score"].is_null());
        assert!(body["detail"].as_str().expect("detail").contains("runner image missing"));

        // The failed attempt still occupies a ledger slot.
        let history = context
            .app
            .clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/activities/{activity_id}/attempts"),
                Some("student-1"),
                None,
            ))
            .await
            .expect("response");
        let history = read_json(history).await;
        assert_eq!(history["attempts"].as_array().map(|attempts| attempts.len()), Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wall_timeout_records_a_timed_out_attempt() {
        let Some(context) =
            test_support::setup_grading_context_with_wall_timeout(HANGING_STUB, 1).await
        else {
            return;
        };
        let activity_id = seed(context.state.db(), "python", true).await;

        let response = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["outcome"], "timed_out");
        assert_eq!(body["graded"], false);
        assert!(body["score"].is_null());
        assert_eq!(body["detail"], "execution timed out");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submitting_an_unsupported_language_is_unprocessable() {
        let Some(context) = test_support::setup_grading_context(ALL_PASS_STUB).await else {
            return;
        };
        let activity_id = seed(context.state.db(), "cobol", true).await;

        let response = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body(&activity_id)),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(response).await;
        assert!(body["detail"].as_str().expect("detail").contains("unsupported language"));

        let count =
            repositories::attempts::count_for_activity(context.state.db(), "student-1", &activity_id)
                .await
                .expect("count");
        assert_eq!(count, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submitting_to_a_missing_activity_is_not_found() {
        let Some(context) = test_support::setup_grading_context(ALL_PASS_STUB).await else {
            return;
        };

        let response = context
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some("student-1"),
                Some(submit_body("no-such-activity")),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::state::AppState;

pub(crate) const STUDENT_ID_HEADER: &str = "x-student-id";

/// Student identity asserted by the upstream gateway. The engine trusts the
/// header as-is; authenticating students is the platform's job.
pub(crate) struct CurrentStudent(pub(crate) String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let student_id = parts
            .headers
            .get(STUDENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::Unauthorized("Missing student identity"))?;

        Ok(CurrentStudent(student_id.to_string()))
    }
}

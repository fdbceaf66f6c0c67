use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::core::metrics;
use crate::core::state::AppState;
use crate::harness::languages::SUPPORTED_LANGUAGES;
use crate::repositories;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    let response = RootResponse {
        service: api.project_name.clone(),
        version: api.version.clone(),
        api_base: api.api_v1_str.clone(),
        languages: SUPPORTED_LANGUAGES.iter().map(|name| name.to_string()).collect(),
    };

    Json(response)
}

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy";
    let mut components = BTreeMap::new();

    match repositories::health::ping(state.db()).await {
        Ok(()) => {
            components.insert("database".to_string(), "healthy".to_string());
        }
        Err(err) => {
            components.insert("database".to_string(), format!("unhealthy: {err}"));
            status = "unhealthy";
        }
    }

    // Every staged submission lands under the workspace root.
    match std::fs::create_dir_all(&state.settings().sandbox().workspace_root) {
        Ok(()) => {
            components.insert("workspace".to_string(), "healthy".to_string());
        }
        Err(err) => {
            components.insert("workspace".to_string(), format!("unavailable: {err}"));
            if status == "healthy" {
                status = "degraded";
            }
        }
    }

    Json(HealthResponse {
        service: "gradecell-api".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

//! Management endpoints: health and incident listing.

use crate::proxy::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

const DEFAULT_INCIDENT_LIMIT: u32 = 100;

/// Query parameters for `GET /api/incidents`.
#[derive(Debug, Deserialize)]
pub struct IncidentQuery {
    pub limit: Option<u32>,
}

/// `GET /health` — liveness plus a storage connectivity check.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.incidents.health_check().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "environment": state.config.environment,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Storage health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "environment": state.config.environment,
                })),
            )
                .into_response()
        }
    }
}

/// `GET /api/incidents` — most recent incidents, newest first.
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IncidentQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_INCIDENT_LIMIT);
    match state.incidents.recent(limit).await {
        Ok(incidents) => Json(incidents).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list incidents");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to list incidents",
                })),
            )
                .into_response()
        }
    }
}

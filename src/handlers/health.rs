// Health handlers
// Liveness and readiness probes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Body returned by a successful readiness probe
#[derive(Debug, Serialize, Deserialize)]
pub struct Readiness {
    pub status: String,
    pub database: String,
    pub checked_at: DateTime<Utc>,
}

/// Liveness probe
/// GET /v1/health
/// Always answers `ok`; touches no dependency.
#[tracing::instrument]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe
/// GET /v1/ready
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    if let Err(e) = state.db.ping().await {
        warn!("Readiness check failed: {}", e);
        return Err(ApiError::unavailable("Database is not reachable"));
    }

    let body = Readiness {
        status: "ready".to_string(),
        database: "up".to_string(),
        checked_at: Utc::now(),
    };

    Ok((StatusCode::OK, Json(body)))
}

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check endpoint; unhealthy when the store does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ping = tokio::time::timeout(state.request_timeout, state.service.store().ping()).await;

    let (status, label) = match ping {
        Ok(Ok(())) => (StatusCode::OK, "healthy"),
        Ok(Err(e)) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
        Err(_) => {
            warn!("Health check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            service: "order-service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

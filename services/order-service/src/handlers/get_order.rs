use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::Order;
use order_orchestrator::{with_deadline, OrderServiceError};
use std::time::Instant;
use tracing::{error, info};

use super::{internal_error, observe};
use crate::state::AppState;

const MISSING_ID: &str = "order_uid is required";

/// Get a single order by `order_uid`
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, (StatusCode, String)> {
    let started = Instant::now();
    let result = fetch(&state, order_uid.trim()).await;
    observe("get_order", started, &result);
    result
}

/// `GET /order` without an identifier
pub async fn missing_order_uid() -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, MISSING_ID.to_string())
}

async fn fetch(state: &AppState, order_uid: &str) -> Result<Json<Order>, (StatusCode, String)> {
    if order_uid.is_empty() {
        return Err((StatusCode::BAD_REQUEST, MISSING_ID.to_string()));
    }

    match with_deadline(state.request_timeout, state.service.get_order(order_uid)).await {
        Ok(order) => Ok(Json(order)),
        Err(OrderServiceError::NotFound(_)) => {
            info!("Order not found: {}", order_uid);
            Err((StatusCode::NOT_FOUND, "order not found".to_string()))
        }
        Err(e) => {
            error!("Failed to fetch order {}: {}", order_uid, e);
            Err(internal_error())
        }
    }
}

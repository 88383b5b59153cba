use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use domain::Order;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{internal_error, observe};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: &'static str,
    pub order_uid: String,
    pub partition: i32,
    pub offset: i64,
}

/// Forward an order to the broker; it is validated when it is ingested.
pub async fn publish_order_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    let started = Instant::now();
    let result = publish(&state, &body).await;
    observe("publish_order", started, &result);
    result
}

async fn publish(state: &AppState, body: &[u8]) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    let order: Order = serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected publish request: {}", e);
        (StatusCode::BAD_REQUEST, "invalid JSON".to_string())
    })?;

    let publish = state.publisher.publish(&order.order_uid, &order);
    let position = match tokio::time::timeout(state.request_timeout, publish).await {
        Ok(Ok(position)) => position,
        Ok(Err(e)) => {
            error!(order_uid = %order.order_uid, "Failed to publish order: {}", e);
            return Err(internal_error());
        }
        Err(_) => {
            error!(order_uid = %order.order_uid, "Publishing order timed out");
            return Err(internal_error());
        }
    };

    info!(
        order_uid = %order.order_uid,
        partition = position.partition,
        offset = position.offset,
        "Order published"
    );

    Ok(Json(PublishResponse {
        status: "ok",
        order_uid: order.order_uid,
        partition: position.partition,
        offset: position.offset,
    }))
}

use axum::{extract::State, http::StatusCode, Json};
use domain::Order;
use order_orchestrator::with_deadline;
use std::time::Instant;
use tracing::error;

use super::{internal_error, observe};
use crate::state::AppState;

/// List every order, sorted by `order_uid`
pub async fn list_orders_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, (StatusCode, String)> {
    let started = Instant::now();

    let result = match with_deadline(state.request_timeout, state.service.get_orders()).await {
        Ok(orders) => {
            let mut orders: Vec<Order> = orders.into_values().collect();
            orders.sort_by(|a, b| a.order_uid.cmp(&b.order_uid));
            Ok(Json(orders))
        }
        Err(e) => {
            error!("Failed to list orders: {}", e);
            Err(internal_error())
        }
    };

    observe("list_orders", started, &result);
    result
}

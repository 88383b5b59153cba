use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use common::metrics;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::from("Failed to gather metrics"))
        }
    }
}

/// Build the application router with all routes.
///
/// `static_dir` serves the browser UI: `index.html` at `/` and assets under `/static`.
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let static_dir = static_dir.as_ref();

    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))
        .route("/order", get(handlers::get_order::missing_order_uid))
        .route("/order/", get(handlers::get_order::missing_order_uid))
        .route("/order/:order_uid", get(handlers::get_order::get_order_handler))
        .route("/orders", get(handlers::list_orders::list_orders_handler))
        .route("/publish-order", post(handlers::publish_order::publish_order_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

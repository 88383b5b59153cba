pub mod get_order;
pub mod health;
pub mod list_orders;
pub mod publish_order;

use axum::http::StatusCode;
use common::metrics;
use std::time::Instant;

/// Generic body for failures whose detail is only logged.
pub(crate) const INTERNAL_ERROR: &str = "internal server error";

pub(crate) fn internal_error() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
}

/// Record the outcome of a request against `endpoint`.
pub(crate) fn observe<T>(
    endpoint: &str,
    started: Instant,
    result: &Result<T, (StatusCode, String)>,
) {
    let status = match result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    metrics::record_http_request(endpoint, status.as_u16(), started.elapsed().as_secs_f64());
}

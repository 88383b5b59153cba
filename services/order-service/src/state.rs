use messaging::OrderPublisher;
use order_orchestrator::OrderService;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub publisher: Arc<OrderPublisher>,
    /// Deadline for each request's downstream work.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        service: Arc<OrderService>,
        publisher: Arc<OrderPublisher>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            service,
            publisher,
            request_timeout,
        }
    }
}

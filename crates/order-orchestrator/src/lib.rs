pub mod errors;
pub mod service;

pub use errors::{OrderServiceError, Result};
pub use service::{with_deadline, OrderService};

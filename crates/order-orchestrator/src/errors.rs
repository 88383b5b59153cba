use order_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Deadline exceeded")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, OrderServiceError>;

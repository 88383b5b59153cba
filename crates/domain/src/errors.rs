use thiserror::Error;

/// Why an inbound order was refused before reaching the store.
#[derive(Debug, Error)]
pub enum OrderRejection {
    #[error("Failed to decode order: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Order has an empty {0} section")]
    Incomplete(&'static str),

    #[error("Validation error: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Item has a zero {0}")]
    MissingItemId(&'static str),

    #[error("Phone number is not in E.164 form: {0}")]
    InvalidPhone(String),
}

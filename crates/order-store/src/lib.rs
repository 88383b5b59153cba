pub mod postgres_store;
mod rows;

pub use postgres_store::PostgresOrderStore;

use async_trait::async_trait;
use domain::Order;
use std::collections::HashMap;
use thiserror::Error;

/// Durable storage for order aggregates.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write the whole aggregate in one transaction; nothing is visible on failure.
    async fn save_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Load one aggregate; `None` when no header row exists.
    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Load every aggregate keyed by `order_uid`.
    async fn get_orders(&self) -> Result<HashMap<String, Order>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Order {order_uid} has no {section} row")]
    MissingSection {
        order_uid: String,
        section: &'static str,
    },
}

//! Kafka plumbing for order messages: a keyed producer and a manually
//! committed consumer-group session.

pub mod consumer;
pub mod producer;

pub use consumer::{ConsumerError, OrderConsumer};
pub use producer::{DeliveryPosition, OrderPublisher, PublisherError};

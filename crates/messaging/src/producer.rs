use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to create Kafka producer: {0}")]
    ProducerCreation(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),
}

/// Where the broker stored a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryPosition {
    pub partition: i32,
    pub offset: i64,
}

/// Kafka producer bound to a single topic
pub struct OrderPublisher {
    producer: FutureProducer,
    topic: String,
}

impl OrderPublisher {
    /// Create a new OrderPublisher
    ///
    /// # Arguments
    /// * `brokers` - Comma-separated list of Kafka brokers (e.g., "localhost:9092")
    /// * `topic` - The topic to publish to
    ///
    /// # Example
    /// ```no_run
    /// use messaging::OrderPublisher;
    ///
    /// let publisher = OrderPublisher::new("localhost:9092", "orders".to_string())
    ///     .expect("Failed to create publisher");
    /// ```
    pub fn new(brokers: &str, topic: String) -> Result<Self, PublisherError> {
        info!("Creating Kafka producer for brokers: {}", brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all") // Wait for all replicas to acknowledge
            .set("retries", "3")
            .create()
            .map_err(|e| PublisherError::ProducerCreation(e.to_string()))?;

        info!("Kafka producer created successfully for topic: {}", topic);

        Ok(Self { producer, topic })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serialize `value` as JSON and publish it under `key`.
    pub async fn publish<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<DeliveryPosition, PublisherError> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key.as_bytes(), &payload, &[]).await
    }

    /// Publish an already encoded payload with optional string headers.
    /// An empty `key` publishes without a key.
    pub async fn publish_raw(
        &self,
        key: &[u8],
        payload: &[u8],
        headers: &[(&str, &str)],
    ) -> Result<DeliveryPosition, PublisherError> {
        let headers = headers
            .iter()
            .fold(OwnedHeaders::new(), |acc, &(name, value)| {
                acc.insert(Header {
                    key: name,
                    value: Some(value),
                })
            });

        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic)
            .payload(payload)
            .headers(headers);
        if !key.is_empty() {
            record = record.key(key);
        }

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    "Message published to topic '{}', partition {}, offset {}",
                    self.topic, partition, offset
                );
                Ok(DeliveryPosition { partition, offset })
            }
            Err((err, _)) => {
                warn!("Failed to publish to topic '{}': {}", self.topic, err);
                Err(PublisherError::PublishFailed(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::testing::sample_order;

    #[test]
    fn test_publisher_creation_with_invalid_brokers() {
        // Creation doesn't validate the connection
        let result = OrderPublisher::new("", "orders".to_string());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().topic(), "orders");
    }

    #[test]
    fn test_order_payload_uses_wire_names() {
        let payload = serde_json::to_value(sample_order("b563feb7b2b84b6test")).unwrap();
        assert_eq!(payload["order_uid"], "b563feb7b2b84b6test");
        assert!(payload["delivery"]["phone"].is_string());
    }

    #[test]
    fn test_delivery_position_serializes_flat() {
        let position = DeliveryPosition {
            partition: 2,
            offset: 41,
        };
        let json = serde_json::to_value(position).unwrap();
        assert_eq!(json, serde_json::json!({ "partition": 2, "offset": 41 }));
    }
}

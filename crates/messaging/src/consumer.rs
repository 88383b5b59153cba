use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer,
};
use rdkafka::error::KafkaResult;
use rdkafka::message::BorrowedMessage;
use rdkafka::{ClientContext, TopicPartitionList};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Logs partition assignment changes and commit outcomes for the session.
pub struct SessionContext;

impl ClientContext for SessionContext {}

impl ConsumerContext for SessionContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Revoke(partitions) => {
                info!("Partitions revoked: {}", describe(partitions))
            }
            Rebalance::Assign(partitions) => {
                debug!("Assigning partitions: {}", describe(partitions))
            }
            Rebalance::Error(e) => warn!("Rebalance error: {:?}", e),
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(partitions) = rebalance {
            info!("Partitions assigned: {}", describe(partitions));
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!("Committed offsets: {}", describe(offsets)),
            Err(e) => warn!("Offset commit failed: {}", e),
        }
    }
}

fn describe(partitions: &TopicPartitionList) -> String {
    partitions
        .elements()
        .iter()
        .map(|p| format!("{}[{}]@{:?}", p.topic(), p.partition(), p.offset()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Consumer-group member with manual offset commits.
///
/// Offsets are never committed implicitly; callers commit each message once
/// its outcome is final.
pub struct OrderConsumer {
    consumer: StreamConsumer<SessionContext>,
    group_id: String,
}

impl OrderConsumer {
    /// Create a new Kafka consumer. No topic is subscribed yet.
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, ConsumerError> {
        info!("Creating Kafka consumer with group_id: {}", group_id);

        let consumer: StreamConsumer<SessionContext> = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create_with_context(SessionContext)?;

        Ok(Self {
            consumer,
            group_id: group_id.to_string(),
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn subscribe(&self, topic: &str) -> Result<(), ConsumerError> {
        self.consumer.subscribe(&[topic])?;
        info!(group_id = %self.group_id, "Subscribed to topic: {}", topic);
        Ok(())
    }

    pub fn unsubscribe(&self) {
        self.consumer.unsubscribe();
        info!(group_id = %self.group_id, "Unsubscribed");
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> Result<BorrowedMessage<'_>, ConsumerError> {
        Ok(self.consumer.recv().await?)
    }

    /// Mark `message` as processed for the group.
    pub fn commit_message(&self, message: &BorrowedMessage<'_>) -> Result<(), ConsumerError> {
        self.consumer.commit_message(message, CommitMode::Async)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::Offset;

    #[tokio::test]
    async fn test_consumer_creation_invalid_broker() {
        // Creation succeeds; the connection happens on first poll
        let consumer = OrderConsumer::new("invalid:9092", "test-group").unwrap();
        assert_eq!(consumer.group_id(), "test-group");
    }

    #[test]
    fn test_describe_lists_partitions() {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset("orders", 0, Offset::Offset(5))
            .unwrap();
        tpl.add_partition("orders", 1);

        let text = describe(&tpl);
        assert!(text.contains("orders[0]@Offset(5)"));
        assert!(text.contains("orders[1]"));
    }
}

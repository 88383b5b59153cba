use async_trait::async_trait;
use messaging::{OrderPublisher, PublisherError};
use tracing::warn;

/// Header carrying the last persistence error of a dead-lettered message.
pub const REASON_HEADER: &str = "x-dead-letter-reason";

/// Destination for messages whose durable write kept failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn dead_letter(&self, key: &[u8], payload: &[u8], reason: &str)
        -> Result<(), PublisherError>;
}

#[async_trait]
impl DeadLetterSink for OrderPublisher {
    async fn dead_letter(
        &self,
        key: &[u8],
        payload: &[u8],
        reason: &str,
    ) -> Result<(), PublisherError> {
        let position = self
            .publish_raw(key, payload, &[(REASON_HEADER, reason)])
            .await?;
        warn!(
            "Message dead-lettered to '{}' at partition {}, offset {}",
            self.topic(),
            position.partition,
            position.offset
        );
        Ok(())
    }
}

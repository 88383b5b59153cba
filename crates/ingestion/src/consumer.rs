use std::sync::Arc;
use std::time::Duration;

use messaging::{ConsumerError, OrderConsumer};
use rdkafka::message::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handler::MessageHandler;

const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Long-lived consumer-group session feeding the message handler.
///
/// Each session subscribes, drains messages one at a time and unsubscribes
/// when it ends. A failed session is restarted until `shutdown` is cancelled.
pub struct IngestionConsumer {
    consumer: OrderConsumer,
    topic: String,
    handler: Arc<MessageHandler>,
}

impl IngestionConsumer {
    pub fn new(consumer: OrderConsumer, topic: String, handler: Arc<MessageHandler>) -> Self {
        Self {
            consumer,
            topic,
            handler,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            group_id = %self.consumer.group_id(),
            "Starting order consumer on topic: {}", self.topic
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.session(&shutdown).await {
                error!(error = %e, "Consumer session failed");
            }

            if shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(RESTART_DELAY) => {
                    info!("Restarting consumer session");
                }
            }
        }

        info!("Order consumer stopped");
    }

    async fn session(&self, shutdown: &CancellationToken) -> Result<(), ConsumerError> {
        // Setup
        self.consumer.subscribe(&self.topic)?;

        let result = self.consume_claim(shutdown).await;

        // Cleanup
        self.consumer.unsubscribe();
        result
    }

    async fn consume_claim(&self, shutdown: &CancellationToken) -> Result<(), ConsumerError> {
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = self.consumer.recv() => received?,
            };

            debug!(
                "Received message from partition {}, offset {}",
                message.partition(),
                message.offset()
            );

            let Some(payload) = message.payload() else {
                warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "Skipping message without payload"
                );
                self.consumer.commit_message(&message)?;
                continue;
            };
            let key = message.key().unwrap_or_default();

            let disposition = self.handler.handle(key, payload, shutdown).await;

            if disposition.is_final() {
                self.consumer.commit_message(&message)?;
            } else {
                return Ok(());
            }
        }
    }
}

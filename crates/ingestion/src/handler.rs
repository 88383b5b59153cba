use std::sync::Arc;
use std::time::Duration;

use common::config::IngestionConfig;
use common::metrics;
use domain::OrderValidator;
use order_orchestrator::{with_deadline, OrderService};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dead_letter::DeadLetterSink;

/// Final outcome of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Durably stored.
    Saved,
    /// Undecodable or failed validation; retrying cannot help.
    Rejected,
    /// Persistence kept failing and the payload went to the dead-letter topic.
    DeadLettered,
    /// Shutdown was requested before the message reached a final outcome.
    Abandoned,
}

impl Disposition {
    /// Whether the broker offset may be committed.
    pub fn is_final(self) -> bool {
        !matches!(self, Disposition::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Saved => "saved",
            Disposition::Rejected => "rejected",
            Disposition::DeadLettered => "dead_lettered",
            Disposition::Abandoned => "abandoned",
        }
    }
}

/// Turns raw broker payloads into stored orders.
pub struct MessageHandler {
    validator: OrderValidator,
    service: Arc<OrderService>,
    config: IngestionConfig,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

impl MessageHandler {
    pub fn new(
        validator: OrderValidator,
        service: Arc<OrderService>,
        config: IngestionConfig,
        dead_letters: Option<Arc<dyn DeadLetterSink>>,
    ) -> Self {
        Self {
            validator,
            service,
            config,
            dead_letters,
        }
    }

    /// Decode, validate and persist one payload.
    pub async fn handle(
        &self,
        key: &[u8],
        payload: &[u8],
        shutdown: &CancellationToken,
    ) -> Disposition {
        let disposition = self.process(key, payload, shutdown).await;
        metrics::record_ingested_message(disposition.as_str());
        disposition
    }

    async fn process(
        &self,
        key: &[u8],
        payload: &[u8],
        shutdown: &CancellationToken,
    ) -> Disposition {
        let order = match self.validator.decode(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    key = %String::from_utf8_lossy(key),
                    error = %e,
                    "Rejected order message"
                );
                return Disposition::Rejected;
            }
        };

        let order_uid = order.order_uid.clone();
        let mut backoff = self.config.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = with_deadline(
                self.config.save_timeout,
                self.service.save_order(order.clone()),
            )
            .await;

            let err = match result {
                Ok(()) => {
                    info!(order_uid = %order_uid, attempt, "Order ingested");
                    return Disposition::Saved;
                }
                Err(e) => e,
            };

            warn!(
                order_uid = %order_uid,
                attempt,
                error = %err,
                "Failed to persist order"
            );

            if attempt >= self.config.max_attempts {
                if let Some(sink) = &self.dead_letters {
                    match sink.dead_letter(key, payload, &err.to_string()).await {
                        Ok(()) => {
                            error!(
                                order_uid = %order_uid,
                                attempts = attempt,
                                "Order dead-lettered after exhausting retries"
                            );
                            return Disposition::DeadLettered;
                        }
                        Err(dlq_err) => {
                            error!(
                                order_uid = %order_uid,
                                error = %dlq_err,
                                "Dead-lettering failed, offset stays uncommitted"
                            );
                        }
                    }
                }
                backoff = self.config.max_backoff;
            }

            metrics::record_ingest_retry("save");
            debug!(order_uid = %order_uid, "Retrying in {:?}", backoff);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    warn!(order_uid = %order_uid, "Shutdown during retry, message will be redelivered");
                    return Disposition::Abandoned;
                }
                _ = tokio::time::sleep(backoff) => {}
            }

            backoff = next_backoff(backoff, self.config.max_backoff);
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

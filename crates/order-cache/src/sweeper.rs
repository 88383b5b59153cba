use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::OrderCache;

impl OrderCache {
    /// Periodically purge expired entries until `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            info!("Cache sweeper started with interval: {:?}", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired().await;
                        if removed > 0 {
                            debug!("Cache sweeper removed {} expired orders", removed);
                        }
                    }
                }
            }

            info!("Cache sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::testing::sample_order;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_entries() {
        let cache = Arc::new(OrderCache::new(Duration::from_secs(10)));
        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(1), shutdown.clone());

        cache.set(sample_order("a")).await;
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(cache.len().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_fresh_entries() {
        let cache = Arc::new(OrderCache::new(Duration::from_secs(30)));
        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(1), shutdown.clone());

        cache.set(sample_order("a")).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(cache.get("a").await.is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let cache = Arc::new(OrderCache::new(Duration::from_secs(10)));
        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(3600), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop promptly")
            .unwrap();
    }
}

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::Order;
use order_cache::OrderCache;
use order_store::OrderRepository;
use tracing::{debug, info, warn};

use crate::errors::{OrderServiceError, Result};

/// Read-through / write-through mediation between the store and the cache.
///
/// The store is the source of truth. The cache is only written after the
/// store has accepted an aggregate, and only ever holds values that were
/// read from or written to the store.
pub struct OrderService {
    store: Arc<dyn OrderRepository>,
    cache: Arc<OrderCache>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderRepository>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn OrderRepository> {
        &self.store
    }

    /// Persist the order, then cache it.
    pub async fn save_order(&self, order: Order) -> Result<()> {
        self.store.save_order(&order).await?;
        self.cache.set(order).await;
        Ok(())
    }

    /// Cache first, store on miss. A store hit populates the cache.
    pub async fn get_order(&self, order_uid: &str) -> Result<Order> {
        if let Some(order) = self.cache.get(order_uid).await {
            debug!(order_uid, "Served order from cache");
            return Ok(order);
        }

        match self.store.get_order(order_uid).await? {
            Some(order) => {
                self.cache.set(order.clone()).await;
                debug!(order_uid, "Loaded order from store");
                Ok(order)
            }
            None => Err(OrderServiceError::NotFound(order_uid.to_string())),
        }
    }

    /// All orders. On a cache miss the whole store is loaded and the cache
    /// is rebuilt from that snapshot.
    pub async fn get_orders(&self) -> Result<HashMap<String, Order>> {
        if let Some(orders) = self.cache.get_all().await {
            return Ok(orders);
        }

        let orders = self.store.get_orders().await?;
        self.cache.restore(orders.clone()).await;
        Ok(orders)
    }

    /// Replace the cache contents with everything in the store.
    pub async fn restore_cache(&self) -> Result<usize> {
        let orders = self.store.get_orders().await?;
        let count = orders.len();
        self.cache.restore(orders).await;
        info!("Restored {} orders into cache", count);
        Ok(count)
    }
}

/// Bound a call by `deadline`. Only the wrapped future is abandoned when it elapses.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Call exceeded deadline of {:?}", deadline);
            Err(OrderServiceError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::testing::sample_order;
    use order_store::{MockOrderRepository, StoreError};

    const TTL: Duration = Duration::from_secs(10);

    fn service(store: MockOrderRepository) -> OrderService {
        OrderService::new(Arc::new(store), Arc::new(OrderCache::new(TTL)))
    }

    fn store_failure(uid: &str) -> StoreError {
        StoreError::MissingSection {
            order_uid: uid.to_string(),
            section: "payment",
        }
    }

    #[tokio::test]
    async fn test_save_writes_store_then_cache() {
        let mut store = MockOrderRepository::new();
        store
            .expect_save_order()
            .withf(|order| order.order_uid == "a")
            .times(1)
            .returning(|_| Ok(()));
        let service = service(store);

        service.save_order(sample_order("a")).await.unwrap();

        assert_eq!(service.cache().get("a").await, Some(sample_order("a")));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_cache_untouched() {
        let mut store = MockOrderRepository::new();
        store
            .expect_save_order()
            .returning(|order| Err(store_failure(&order.order_uid)));
        let service = service(store);

        let result = service.save_order(sample_order("a")).await;

        assert!(matches!(result, Err(OrderServiceError::Store(_))));
        assert!(service.cache().get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_get_order_prefers_cache() {
        let mut store = MockOrderRepository::new();
        store.expect_get_order().never();
        let service = service(store);
        service.cache().set(sample_order("a")).await;

        let order = service.get_order("a").await.unwrap();
        assert_eq!(order.order_uid, "a");
    }

    #[tokio::test]
    async fn test_get_order_reads_through_and_populates_cache() {
        let mut store = MockOrderRepository::new();
        store
            .expect_get_order()
            .withf(|uid| uid == "a")
            .times(1)
            .returning(|uid| Ok(Some(sample_order(uid))));
        let service = service(store);

        assert_eq!(service.get_order("a").await.unwrap(), sample_order("a"));
        // Second read is a cache hit; the mock allows only one store call.
        assert_eq!(service.get_order("a").await.unwrap(), sample_order("a"));
    }

    #[tokio::test]
    async fn test_get_missing_order_is_not_found_and_not_cached() {
        let mut store = MockOrderRepository::new();
        store.expect_get_order().times(2).returning(|_| Ok(None));
        let service = service(store);

        for _ in 0..2 {
            let result = service.get_order("ghost").await;
            assert!(matches!(result, Err(OrderServiceError::NotFound(uid)) if uid == "ghost"));
        }
        assert!(service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_order_propagates_store_error() {
        let mut store = MockOrderRepository::new();
        store
            .expect_get_order()
            .returning(|uid| Err(store_failure(uid)));
        let service = service(store);

        let result = service.get_order("a").await;
        assert!(matches!(result, Err(OrderServiceError::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_order_refetches_after_expiry() {
        let mut store = MockOrderRepository::new();
        store
            .expect_get_order()
            .times(1)
            .returning(|uid| Ok(Some(sample_order(uid))));
        let service = service(store);
        service.cache().set(sample_order("a")).await;

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        service.get_order("a").await.unwrap();
        assert!(service.cache().get("a").await.is_some());
    }

    #[tokio::test]
    async fn test_get_orders_served_from_cache() {
        let mut store = MockOrderRepository::new();
        store.expect_get_orders().never();
        let service = service(store);
        service.cache().set(sample_order("a")).await;

        let orders = service.get_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert!(orders.contains_key("a"));
    }

    #[tokio::test]
    async fn test_get_orders_miss_restores_cache() {
        let mut store = MockOrderRepository::new();
        store.expect_get_orders().times(1).returning(|| {
            Ok(["a", "b"]
                .into_iter()
                .map(|uid| (uid.to_string(), sample_order(uid)))
                .collect())
        });
        let service = service(store);

        let orders = service.get_orders().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(service.cache().len().await, 2);

        // Served from the restored cache.
        assert_eq!(service.get_orders().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_orders_on_empty_store_is_empty_not_error() {
        let mut store = MockOrderRepository::new();
        store
            .expect_get_orders()
            .returning(|| Ok(HashMap::new()));
        let service = service(store);

        assert!(service.get_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_cache_replaces_contents() {
        let mut store = MockOrderRepository::new();
        store.expect_get_orders().returning(|| {
            Ok(HashMap::from([("b".to_string(), sample_order("b"))]))
        });
        let service = service(store);
        service.cache().set(sample_order("a")).await;

        assert_eq!(service.restore_cache().await.unwrap(), 1);
        assert!(service.cache().get("a").await.is_none());
        assert!(service.cache().get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_restore_cache_failure_keeps_cache() {
        let mut store = MockOrderRepository::new();
        store
            .expect_get_orders()
            .returning(|| Err(store_failure("*")));
        let service = service(store);
        service.cache().set(sample_order("a")).await;

        assert!(service.restore_cache().await.is_err());
        assert!(service.cache().get("a").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };

        let result = with_deadline(Duration::from_secs(5), slow).await;
        assert!(matches!(result, Err(OrderServiceError::Timeout)));
    }

    #[tokio::test]
    async fn test_with_deadline_passes_through_results() {
        let value = with_deadline(Duration::from_secs(5), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_deadline::<(), _>(Duration::from_secs(5), async {
            Err(OrderServiceError::NotFound("x".to_string()))
        })
        .await;
        assert!(matches!(err, Err(OrderServiceError::NotFound(_))));
    }
}

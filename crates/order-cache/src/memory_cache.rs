use std::collections::HashMap;
use std::time::Duration;

use common::metrics;
use domain::Order;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

struct CacheEntry {
    order: Order,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory order cache with a fixed time-to-live per entry.
///
/// A single reader/writer lock covers the whole map. Lookups take the shared
/// side; anything that changes the map (`set`, `restore`, `purge_expired`,
/// capacity eviction) takes the exclusive side.
///
/// Expired entries are masked on read and left in place until they are
/// overwritten, purged by the sweeper, or evicted to honour `max_entries`.
pub struct OrderCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl OrderCache {
    /// Create an unbounded cache.
    pub fn new(ttl: Duration) -> Self {
        info!("Order cache initialized with TTL: {:?}", ttl);
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    /// Create a cache holding at most `max_entries` entries after any `set`.
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        info!(
            "Order cache initialized with TTL: {:?}, capacity: {}",
            ttl, max_entries
        );
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: Some(max_entries.max(1)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store the order under its `order_uid`, replacing any previous value and expiry.
    pub async fn set(&self, order: Order) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let key = order.order_uid.clone();

        entries.insert(
            key.clone(),
            CacheEntry {
                order,
                expires_at: now + self.ttl,
            },
        );
        debug!(order_uid = %key, "Cached order with TTL: {:?}", self.ttl);

        if let Some(max_entries) = self.max_entries {
            if entries.len() > max_entries {
                Self::evict(&mut entries, max_entries, &key, now);
            }
        }

        metrics::set_cache_entries(entries.len());
    }

    /// Fresh value for `order_uid`, or `None` when absent or expired.
    pub async fn get(&self, order_uid: &str) -> Option<Order> {
        let entries = self.entries.read().await;
        let now = Instant::now();

        let found = entries
            .get(order_uid)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.order.clone());

        match &found {
            Some(_) => debug!(order_uid, "Cache hit"),
            None => debug!(order_uid, "Cache miss"),
        }
        metrics::record_cache_request("get", found.is_some());

        found
    }

    /// Every fresh entry keyed by `order_uid`, or `None` when nothing is fresh.
    pub async fn get_all(&self) -> Option<HashMap<String, Order>> {
        let entries = self.entries.read().await;
        let now = Instant::now();

        let fresh: HashMap<String, Order> = entries
            .iter()
            .filter(|(_, entry)| entry.is_fresh(now))
            .map(|(uid, entry)| (uid.clone(), entry.order.clone()))
            .collect();

        let hit = !fresh.is_empty();
        metrics::record_cache_request("get_all", hit);

        if hit {
            debug!("Cache returned {} fresh orders", fresh.len());
            Some(fresh)
        } else {
            debug!("Cache holds no fresh orders");
            None
        }
    }

    /// Replace the whole cache with `snapshot`. Every entry expires one TTL
    /// from now, whatever its original write time was.
    pub async fn restore(&self, snapshot: HashMap<String, Order>) {
        let mut entries = self.entries.write().await;
        let expires_at = Instant::now() + self.ttl;

        *entries = snapshot
            .into_iter()
            .map(|(uid, order)| (uid, CacheEntry { order, expires_at }))
            .collect();

        metrics::set_cache_entries(entries.len());
        info!("Cache restored with {} orders", entries.len());
    }

    /// Remove every expired entry and return how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = Self::remove_expired(&mut entries, Instant::now());

        metrics::record_cache_evictions("expired", removed);
        metrics::set_cache_entries(entries.len());
        removed
    }

    /// Raw number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn remove_expired(entries: &mut HashMap<String, CacheEntry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Drop expired entries, then the oldest writes, until `max_entries` remain.
    /// The entry just written (`keep`) is never chosen.
    fn evict(
        entries: &mut HashMap<String, CacheEntry>,
        max_entries: usize,
        keep: &str,
        now: Instant,
    ) {
        let expired = Self::remove_expired(entries, now);
        metrics::record_cache_evictions("expired", expired);

        let mut evicted = 0;
        while entries.len() > max_entries {
            let oldest = entries
                .iter()
                .filter(|(uid, _)| uid.as_str() != keep)
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(uid, _)| uid.clone());

            match oldest {
                Some(uid) => {
                    entries.remove(&uid);
                    evicted += 1;
                    debug!(order_uid = %uid, "Evicted order to stay within capacity");
                }
                None => break,
            }
        }
        metrics::record_cache_evictions("capacity", evicted);
    }
}

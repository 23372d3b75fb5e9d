//! Message-id deduplication cache.
//!
//! The remote service delivers at-least-once, so retries of an already
//! handled message must be acknowledged without redispatching. Entries
//! expire after a retention window slightly wider than the verification
//! freshness window, and the cache is size-capped with oldest-first
//! eviction. Nothing survives a restart; the remote retry cadence makes a
//! post-restart duplicate an acceptable risk.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Bounded set of recently seen message ids.
#[derive(Debug)]
pub struct DeduplicationCache {
    retention: Duration,
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    seen: HashMap<String, Instant>,
    /// Insertion order for expiry scans and capacity eviction.
    order: VecDeque<(String, Instant)>,
}

impl DeduplicationCache {
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            retention,
            max_entries,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Record a message id; returns `true` if this is the first sighting.
    ///
    /// Check and insert happen under one lock so two concurrent deliveries
    /// of the same message cannot both observe "first seen".
    pub async fn check_and_insert(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        Self::prune(&mut inner, now, self.retention);

        if inner.seen.contains_key(message_id) {
            return false;
        }

        if inner.seen.len() >= self.max_entries {
            if let Some((oldest, _)) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }

        inner.seen.insert(message_id.to_string(), now);
        inner.order.push_back((message_id.to_string(), now));
        true
    }

    /// Number of live entries, for observability.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        Self::prune(&mut inner, now, self.retention);
        inner.seen.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn prune(inner: &mut CacheInner, now: Instant, retention: Duration) {
        while let Some((id, inserted)) = inner.order.front() {
            if now.duration_since(*inserted) < retention {
                break;
            }
            let id = id.clone();
            inner.order.pop_front();
            inner.seen.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sighting_then_duplicate() {
        let cache = DeduplicationCache::new(Duration::from_secs(60), 100);
        assert!(cache.check_and_insert("msg-1").await);
        assert!(!cache.check_and_insert("msg-1").await);
        assert!(cache.check_and_insert("msg-2").await);
    }

    #[tokio::test]
    async fn entries_expire_after_retention() {
        let cache = DeduplicationCache::new(Duration::from_millis(10), 100);
        assert!(cache.check_and_insert("msg-1").await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.check_and_insert("msg-1").await);
    }

    #[tokio::test]
    async fn evicts_oldest_at_capacity() {
        let cache = DeduplicationCache::new(Duration::from_secs(60), 2);
        assert!(cache.check_and_insert("msg-1").await);
        assert!(cache.check_and_insert("msg-2").await);
        assert!(cache.check_and_insert("msg-3").await);
        assert_eq!(cache.len().await, 2);
        // msg-1 was evicted to make room; it reads as unseen again.
        assert!(cache.check_and_insert("msg-1").await);
    }

    #[tokio::test]
    async fn concurrent_first_seen_checks_admit_exactly_one() {
        use std::sync::Arc;

        let cache = Arc::new(DeduplicationCache::new(Duration::from_secs(60), 100));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(
                async move { cache.check_and_insert("msg-1").await },
            ));
        }
        let mut first_count = 0;
        for task in tasks {
            if task.await.unwrap() {
                first_count += 1;
            }
        }
        assert_eq!(first_count, 1);
    }
}

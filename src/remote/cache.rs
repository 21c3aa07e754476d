//! Time-bounded memo of successful remote fetches.
//!
//! Entries are keyed by request URL and evicted lazily: an access past the
//! entry's TTL deletes it and reports a miss. There is no background sweep.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: Instant,
    pub ttl: Duration,
}

#[derive(Debug)]
pub struct TtlCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Fresh-entry lookup. A stale entry counts as absent and is removed.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let stale = match self.entries.get(key) {
            Some(entry) => entry.timestamp.elapsed() > entry.ttl,
            None => return None,
        };
        if stale {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn insert(&mut self, key: impl Into<String>, data: T) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                data,
                timestamp: Instant::now(),
                ttl: self.ttl,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry count including not-yet-evicted stale entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("http://x/config", 42u32);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("http://x/config"), Some(&42));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("http://x/config"), None);
        // Lazy eviction removed the stale entry.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn insert_refreshes_the_clock() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("url", 1u32);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("url", 2u32);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("url"), Some(&2));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("a", 1u32);
        cache.insert("b", 2u32);
        cache.clear();
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
    }
}

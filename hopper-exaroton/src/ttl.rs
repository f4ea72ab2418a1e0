use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Time-bounded set of keys with lazy eviction. Each component that needs
/// dedupe or cooldown behavior owns its own instance; the caller supplies
/// `now` so tests can drive a paused clock.
#[derive(Debug)]
pub struct TtlCache<K> {
    ttl: Duration,
    entries: HashMap<K, Instant>,
}

impl<K: Eq + Hash> TtlCache<K> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&mut self, key: K, now: Instant) {
        self.purge(now);
        self.entries.insert(key, now);
    }

    /// True if the key was inserted within the TTL window.
    pub fn contains(&mut self, key: &K, now: Instant) -> bool {
        self.purge(now);
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, inserted| now.duration_since(*inserted) <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(6));
        let start = Instant::now();
        cache.insert("leave:Steve", start);
        assert!(cache.contains(&"leave:Steve", start + Duration::from_secs(3)));
        assert!(!cache.contains(&"leave:Steve", start + Duration::from_secs(7)));
    }

    #[test]
    fn test_purge_is_lazy_on_access() {
        let mut cache = TtlCache::new(Duration::from_millis(100));
        let start = Instant::now();
        cache.insert(1u64, start);
        cache.insert(2u64, start);
        assert_eq!(cache.len(), 2);
        cache.insert(3u64, start + Duration::from_secs(1));
        // Inserting purged the stale entries.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reinsert_refreshes_window() {
        let mut cache = TtlCache::new(Duration::from_secs(5));
        let start = Instant::now();
        cache.insert("join:Alex", start);
        cache.insert("join:Alex", start + Duration::from_secs(4));
        assert!(cache.contains(&"join:Alex", start + Duration::from_secs(8)));
    }
}

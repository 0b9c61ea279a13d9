//! Small caching primitives shared by the services.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

/// Hash any hashable value to a `u64` with the standard hasher.
pub fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A map whose entries expire a fixed time after insertion.
#[derive(Debug, Clone)]
pub struct TimedCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Hash + Eq, V: Clone> TimedCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Fetch a live entry, dropping it if it has expired by `now`.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some((stored_at, _)) => now.saturating_duration_since(*stored_at) >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(_, value)| value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Store `value` and drop whatever has expired by `now`, so keys that are never
    /// read again do not pile up.
    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.purge_expired_at(now);
        self.entries.insert(key, (now, value));
    }

    /// Drop every entry that has expired by `now`.
    pub fn purge_expired_at(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored_at, _)| now.saturating_duration_since(*stored_at) < ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

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

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_of("abc"), hash_of("abc"));
        assert_ne!(hash_of("abc"), hash_of("abd"));
    }

    #[test]
    fn test_timed_cache_expiry() {
        let mut cache = TimedCache::new(Duration::from_secs(5));
        let start = Instant::now();

        cache.insert_at("k", 1, start);
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(4)), Some(1));
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(5)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = TimedCache::new(Duration::from_millis(100));
        let start = Instant::now();

        cache.insert_at(1, "old", start);
        cache.insert_at(2, "new", start + Duration::from_millis(80));
        cache.purge_expired_at(start + Duration::from_millis(120));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&2, start + Duration::from_millis(120)), Some("new"));
    }

    #[test]
    fn test_insert_drops_unread_expired_keys() {
        let mut cache = TimedCache::new(Duration::from_secs(5));
        let start = Instant::now();

        for i in 0..200u64 {
            cache.insert_at(i, i, start + Duration::from_secs(i * 60));
        }
        assert_eq!(cache.len(), 1);

        cache.insert_at(1000, 0, start + Duration::from_secs(199 * 60 + 2));
        assert_eq!(cache.len(), 2);
    }
}

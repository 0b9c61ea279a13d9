//! Cache of final rendered text.

use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

use story_model::{NodeId, NodeState, ReaderPath};

use crate::cache::hash_of;
use crate::config::EngineConfig;

/// What a rendered text depends on: the node, its visit count and the recent path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub node_id: NodeId,
    pub visit_count: u32,
    pub pattern_hash: u64,
}

impl ContentKey {
    pub fn new(node: &NodeState, path: &ReaderPath, window: usize) -> Self {
        Self {
            node_id: node.id.clone(),
            visit_count: node.visit_count,
            pattern_hash: hash_of(path.recent_nodes(window)),
        }
    }
}

/// Bounded, expiring cache that evicts off-screen entries before visible ones.
pub struct ContentCache {
    entries: LruCache<ContentKey, (Instant, String)>,
    ttl: Duration,
    visible: HashSet<NodeId>,
}

impl ContentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            ttl,
            visible: HashSet::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.content_cache_capacity, config.content_cache_ttl())
    }

    pub fn get(&mut self, key: &ContentKey) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&mut self, key: &ContentKey, now: Instant) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some((stored_at, _)) => now.saturating_duration_since(*stored_at) >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|(_, content)| content.clone())
    }

    pub fn insert(&mut self, key: ContentKey, content: String) {
        self.insert_at(key, content, Instant::now());
    }

    pub fn insert_at(&mut self, key: ContentKey, content: String, now: Instant) {
        if !self.entries.contains(&key) && self.entries.len() >= self.entries.cap().get() {
            self.evict_one();
        }
        self.entries.put(key, (now, content));
    }

    /// Drop the least recently used off-screen entry, or the oldest entry if all are visible.
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .rev()
            .find(|(key, _)| !self.visible.contains(&key.node_id))
            .map(|(key, _)| key.clone());
        match victim {
            Some(key) => {
                debug!(node = %key.node_id, "evicting off-screen content");
                self.entries.pop(&key);
            }
            None => {
                self.entries.pop_lru();
            }
        }
    }

    /// Record which nodes are currently on screen.
    pub fn mark_visible<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.visible = ids.into_iter().collect();
    }

    pub fn is_visible(&self, id: &NodeId) -> bool {
        self.visible.contains(id)
    }

    pub fn invalidate_node(&mut self, id: &NodeId) {
        let stale: Vec<ContentKey> = self
            .entries
            .iter()
            .filter(|(key, _)| &key.node_id == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.entries.pop(&key);
        }
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
    use story_model::Character;

    fn key(id: &str) -> ContentKey {
        ContentKey {
            node_id: NodeId::from(id),
            visit_count: 1,
            pattern_hash: 0,
        }
    }

    #[test]
    fn test_key_tracks_recent_window() {
        let a = NodeState::new("a", Character::Archaeologist, 2);
        let b = NodeState::new("b", Character::Algorithm, 5);
        let mut path = ReaderPath::new();
        path.record_visit(&a);
        path.record_visit(&b);
        let before = ContentKey::new(&b, &path, 2);

        path.record_visit(&a);
        assert_ne!(before, ContentKey::new(&b, &path, 2));

        // Older history outside the window does not matter.
        let mut other = ReaderPath::new();
        other.record_visit(&b);
        other.record_visit(&a);
        assert_eq!(ContentKey::new(&b, &path, 1), ContentKey::new(&b, &other, 1));
    }

    #[test]
    fn test_expiry() {
        let mut cache = ContentCache::new(4, Duration::from_secs(600));
        let start = Instant::now();
        cache.insert_at(key("a"), "text".to_string(), start);

        assert_eq!(cache.get_at(&key("a"), start + Duration::from_secs(599)).as_deref(), Some("text"));
        assert!(cache.get_at(&key("a"), start + Duration::from_secs(600)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_spares_visible() {
        let mut cache = ContentCache::new(2, Duration::from_secs(600));
        let now = Instant::now();
        cache.mark_visible([NodeId::from("a")]);

        cache.insert_at(key("a"), "A".to_string(), now);
        cache.insert_at(key("b"), "B".to_string(), now);
        cache.insert_at(key("c"), "C".to_string(), now);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_at(&key("a"), now).is_some());
        assert!(cache.get_at(&key("b"), now).is_none());
        assert!(cache.get_at(&key("c"), now).is_some());
    }

    #[test]
    fn test_eviction_falls_back_to_lru() {
        let mut cache = ContentCache::new(2, Duration::from_secs(600));
        let now = Instant::now();
        cache.mark_visible([NodeId::from("a"), NodeId::from("b")]);

        cache.insert_at(key("a"), "A".to_string(), now);
        cache.insert_at(key("b"), "B".to_string(), now);
        cache.insert_at(key("c"), "C".to_string(), now);

        assert!(cache.get_at(&key("a"), now).is_none());
        assert!(cache.get_at(&key("b"), now).is_some());
    }

    #[test]
    fn test_invalidate_node() {
        let mut cache = ContentCache::new(8, Duration::from_secs(600));
        let mut second = key("a");
        second.visit_count = 2;
        cache.insert(key("a"), "one".to_string());
        cache.insert(second, "two".to_string());
        cache.insert(key("b"), "other".to_string());

        cache.invalidate_node(&NodeId::from("a"));
        assert_eq!(cache.len(), 1);
    }
}

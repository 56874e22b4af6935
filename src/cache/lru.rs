//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::HashMap;

use crate::cache::ContentKey;

// == Recency Policy ==
/// Ordering the eviction worker consults to pick victims.
///
/// Implementations are called under the store's index lock and must do only
/// constant-time bookkeeping.
pub trait RecencyPolicy: Send {
    /// Marks a key as most recently used, inserting it if unknown.
    /// Returns true if the key was not tracked before.
    fn touch(&mut self, key: ContentKey) -> bool;

    /// Inserts a key as most recently used. Used while rebuilding from disk.
    fn push(&mut self, key: ContentKey);

    /// Forgets a key. Returns true if it was tracked.
    fn remove(&mut self, key: &ContentKey) -> bool;

    /// Removes and returns the least recently used key.
    fn evict_oldest(&mut self) -> Option<ContentKey>;

    fn contains(&self, key: &ContentKey) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Node {
    key: ContentKey,
    /// Towards the most recent end
    prev: Option<usize>,
    /// Towards the least recent end
    next: Option<usize>,
}

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// A doubly linked list threaded through a slot vector, plus a key → slot map:
/// - Head = Most recently used
/// - Tail = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    nodes: Vec<Node>,
    free: Vec<usize>,
    slots: HashMap<ContentKey, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&ContentKey> {
        self.tail.map(|idx| &self.nodes[idx].key)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn alloc(&mut self, key: ContentKey) -> usize {
        let node = Node {
            key,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> ContentKey {
        self.unlink(idx);
        self.free.push(idx);
        self.nodes[idx].key
    }
}

impl RecencyPolicy for LruTracker {
    // == Touch ==
    /// Marks a key as recently used (moves to front).
    fn touch(&mut self, key: ContentKey) -> bool {
        if let Some(&idx) = self.slots.get(&key) {
            if self.head != Some(idx) {
                self.unlink(idx);
                self.link_front(idx);
            }
            return false;
        }
        self.push(key);
        true
    }

    fn push(&mut self, key: ContentKey) {
        if let Some(&idx) = self.slots.get(&key) {
            self.unlink(idx);
            self.link_front(idx);
            return;
        }
        let idx = self.alloc(key);
        self.slots.insert(key, idx);
        self.link_front(idx);
    }

    // == Remove ==
    fn remove(&mut self, key: &ContentKey) -> bool {
        match self.slots.remove(key) {
            Some(idx) => {
                self.release(idx);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    fn evict_oldest(&mut self) -> Option<ContentKey> {
        let idx = self.tail?;
        let key = self.release(idx);
        self.slots.remove(&key);
        Some(key)
    }

    fn contains(&self, key: &ContentKey) -> bool {
        self.slots.contains_key(key)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn k(name: &str) -> ContentKey {
        ContentKey::new(b"", name.as_bytes())
    }

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        assert!(lru.touch(k("key1")));
        assert!(lru.touch(k("key2")));
        assert!(lru.touch(k("key3")));

        assert_eq!(lru.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(lru.peek_oldest(), Some(&k("key1")));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch(k("key1"));
        lru.touch(k("key2"));
        lru.touch(k("key3"));

        assert!(!lru.touch(k("key1")));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&k("key2")));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruTracker::new();

        lru.touch(k("key1"));
        lru.touch(k("key2"));
        lru.touch(k("key3"));

        assert_eq!(lru.evict_oldest(), Some(k("key1")));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some(k("key2")));
        assert_eq!(lru.len(), 1);
        assert!(!lru.contains(&k("key1")));
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut lru = LruTracker::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch(k("key1"));
        lru.touch(k("key2"));
        lru.touch(k("key3"));

        assert!(lru.remove(&k("key2")));
        assert!(!lru.remove(&k("key2")));

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&k("key2")));
        assert_eq!(lru.evict_oldest(), Some(k("key1")));
        assert_eq!(lru.evict_oldest(), Some(k("key3")));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        lru.touch(k("a"));
        lru.touch(k("b"));
        lru.touch(k("c"));

        // head=[b, c, a]=tail after these
        lru.touch(k("a"));
        lru.touch(k("c"));
        lru.touch(k("b"));

        assert_eq!(lru.evict_oldest(), Some(k("a")));
        assert_eq!(lru.evict_oldest(), Some(k("c")));
        assert_eq!(lru.evict_oldest(), Some(k("b")));
    }

    #[test]
    fn test_lru_push_builds_newest_first() {
        let mut lru = LruTracker::new();

        // startup order: oldest pushed first
        lru.push(k("old"));
        lru.push(k("mid"));
        lru.push(k("new"));

        assert_eq!(lru.evict_oldest(), Some(k("old")));
        assert_eq!(lru.evict_oldest(), Some(k("mid")));
    }

    #[test]
    fn test_lru_slots_are_reused() {
        let mut lru = LruTracker::new();

        for i in 0..10 {
            lru.touch(k(&i.to_string()));
        }
        for _ in 0..10 {
            lru.evict_oldest();
        }
        for i in 10..20 {
            lru.touch(k(&i.to_string()));
        }

        assert_eq!(lru.nodes.len(), 10);
        assert_eq!(lru.peek_oldest(), Some(&k("10")));
    }

    #[test]
    fn test_lru_single_element_touch() {
        let mut lru = LruTracker::new();

        lru.touch(k("only"));
        lru.touch(k("only"));
        lru.touch(k("only"));

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some(k("only")));
        assert!(lru.is_empty());
        assert_eq!(lru.peek_oldest(), None);
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::debug;

use dirstore_types::Duplicate;

use crate::error::{CacheError, CacheResult};

/// Capacity used when none (or zero) is configured.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Percentage of the capacity evicted at once on overflow.
const EVICTION_PERCENT: usize = 20;

/// A cached value and the time it was stored.
#[derive(Debug)]
struct CacheEntry<V> {
    timestamp: SystemTime,
    value: V,
    /// Position in the insertion order.
    seq: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order: sequence number -> key.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    max_size: usize,
}

impl<V> CacheState<V> {
    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }
}

/// Bounded key -> value cache with insertion-order eviction.
///
/// The internal mutex only guards the map structure. Callers (the object
/// store) serialize access per key through the lock manager.
#[derive(Debug)]
pub struct EntryCache<V> {
    label: &'static str,
    state: Mutex<CacheState<V>>,
}

impl<V: Duplicate> EntryCache<V> {
    /// Create a cache bounded to `max_size` entries. Zero selects
    /// [`DEFAULT_MAX_SIZE`].
    pub fn new(label: &'static str, max_size: usize) -> Self {
        let max_size = if max_size == 0 { DEFAULT_MAX_SIZE } else { max_size };
        Self {
            label,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                max_size,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().expect("cache lock poisoned")
    }

    /// Insert a duplicate of `value` under a key that is not yet cached.
    ///
    /// If the cache is full, the oldest `max_size / 5` entries (at least
    /// one) are evicted first.
    pub fn load(&self, key: &str, value: &V) -> CacheResult<()> {
        let mut state = self.state();
        if state.entries.contains_key(key) {
            return Err(CacheError::AlreadyCached(key.to_string()));
        }

        if state.entries.len() + 1 > state.max_size {
            let batch = (state.max_size * EVICTION_PERCENT / 100).max(1);
            let overflow = state.entries.len() + 1 - state.max_size;
            let evicted = state.evict_oldest(batch.max(overflow));
            debug!(cache = self.label, evicted, "cache full; evicted oldest entries");
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, key.to_string());
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                timestamp: SystemTime::now(),
                value: value.duplicate(),
                seq,
            },
        );
        Ok(())
    }

    /// Replace the value of an existing entry with a freshly timestamped
    /// duplicate. The entry keeps its insertion position.
    pub fn update(&self, key: &str, value: &V) -> CacheResult<()> {
        let mut state = self.state();
        let entry = state
            .entries
            .get_mut(key)
            .ok_or_else(|| CacheError::NotCached(key.to_string()))?;
        entry.value = value.duplicate();
        entry.timestamp = SystemTime::now();
        Ok(())
    }

    /// Update if cached, load otherwise.
    pub fn refresh(&self, key: &str, value: &V) -> CacheResult<()> {
        match self.update(key, value) {
            Err(CacheError::NotCached(_)) => self.load(key, value),
            other => other,
        }
    }

    /// A duplicate of the cached value, if present.
    pub fn lookup(&self, key: &str) -> Option<V> {
        let state = self.state();
        let hit = state.entries.get(key).map(|entry| entry.value.duplicate());
        debug!(cache = self.label, key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Evict `key`. Returns `false` if it was not cached.
    pub fn unload(&self, key: &str) -> bool {
        self.state().remove(key)
    }

    /// Evict `prefix` itself and every key below it (`prefix/...`).
    pub fn unload_prefix(&self, prefix: &str) -> usize {
        let mut state = self.state();
        let nested = format!("{prefix}/");
        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|key| key.as_str() == prefix || key.starts_with(&nested))
            .cloned()
            .collect();
        for key in &doomed {
            state.remove(key);
        }
        doomed.len()
    }
}

impl<V> EntryCache<V> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state
            .lock()
            .expect("cache lock poisoned")
            .entries
            .contains_key(key)
    }

    pub fn max_size(&self) -> usize {
        self.state.lock().expect("cache lock poisoned").max_size
    }

    /// Change the capacity. Zero is ignored. Shrinking takes effect on the
    /// next insert.
    pub fn set_max_size(&self, max_size: usize) {
        if max_size > 0 {
            self.state.lock().expect("cache lock poisoned").max_size = max_size;
        }
    }

    /// When `key` was last loaded or updated.
    pub fn timestamp(&self, key: &str) -> Option<SystemTime> {
        self.state
            .lock()
            .expect("cache lock poisoned")
            .entries
            .get(key)
            .map(|entry| entry.timestamp)
    }

    /// Cached keys, oldest insertion first.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("cache lock poisoned")
            .order
            .values()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.entries.clear();
        state.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn cache(max: usize) -> EntryCache<String> {
        EntryCache::new("test", max)
    }

    // -----------------------------------------------------------------------
    // Load / lookup / unload
    // -----------------------------------------------------------------------

    #[test]
    fn load_then_lookup() {
        let c = cache(10);
        c.load("a", &"alpha".to_string()).unwrap();
        assert_eq!(c.lookup("a").as_deref(), Some("alpha"));
        assert!(c.lookup("missing").is_none());
    }

    #[test]
    fn load_existing_key_fails() {
        let c = cache(10);
        c.load("a", &"1".to_string()).unwrap();
        assert_eq!(
            c.load("a", &"2".to_string()),
            Err(CacheError::AlreadyCached("a".into()))
        );
        assert_eq!(c.lookup("a").as_deref(), Some("1"));
    }

    #[test]
    fn unload_absent_is_noop() {
        let c = cache(10);
        assert!(!c.unload("nothing"));
        c.load("a", &"1".to_string()).unwrap();
        assert!(c.unload("a"));
        assert!(c.is_empty());
    }

    #[test]
    fn unload_prefix_is_segment_aware() {
        let c = cache(10);
        for key in ["a/d", "a/d/x", "a/d/.y", "a/dx", "a/.d"] {
            c.load(key, &key.to_string()).unwrap();
        }
        assert_eq!(c.unload_prefix("a/d"), 3);
        assert_eq!(c.keys(), vec!["a/dx".to_string(), "a/.d".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    #[test]
    fn update_requires_existing_entry() {
        let c = cache(10);
        assert_eq!(
            c.update("a", &"x".to_string()),
            Err(CacheError::NotCached("a".into()))
        );
        c.load("a", &"x".to_string()).unwrap();
        let before = c.timestamp("a").unwrap();
        c.update("a", &"y".to_string()).unwrap();
        assert_eq!(c.lookup("a").as_deref(), Some("y"));
        assert!(c.timestamp("a").unwrap() >= before);
    }

    #[test]
    fn update_keeps_insertion_position() {
        let c = cache(10);
        c.load("first", &"1".to_string()).unwrap();
        c.load("second", &"2".to_string()).unwrap();
        c.update("first", &"one".to_string()).unwrap();
        assert_eq!(c.keys(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn refresh_loads_or_updates() {
        let c = cache(10);
        c.refresh("k", &"v1".to_string()).unwrap();
        c.refresh("k", &"v2".to_string()).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.lookup("k").as_deref(), Some("v2"));
    }

    // -----------------------------------------------------------------------
    // Isolation
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_returns_independent_copy() {
        let c: EntryCache<Vec<String>> = EntryCache::new("test", 10);
        let mut original = vec!["a".to_string()];
        c.load("k", &original).unwrap();
        original.push("mutated before lookup".into());

        let mut first = c.lookup("k").unwrap();
        first.push("mutated after lookup".into());

        assert_eq!(c.lookup("k").unwrap(), vec!["a".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    #[test]
    fn overflow_evicts_oldest_fifth() {
        let c = cache(10);
        for i in 0..10 {
            c.load(&format!("k{i}"), &i.to_string()).unwrap();
        }
        assert_eq!(c.len(), 10);

        c.load("k10", &"10".to_string()).unwrap();
        // 20% of 10 = 2 evicted, then one inserted.
        assert_eq!(c.len(), 9);
        assert!(!c.contains("k0"));
        assert!(!c.contains("k1"));
        assert!(c.contains("k2"));
        assert!(c.contains("k10"));
    }

    #[test]
    fn tiny_capacity_still_evicts_one() {
        let c = cache(2);
        c.load("a", &"a".to_string()).unwrap();
        c.load("b", &"b".to_string()).unwrap();
        c.load("c", &"c".to_string()).unwrap();
        assert_eq!(c.keys(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn shrinking_capacity_applies_on_next_insert() {
        let c = cache(10);
        for i in 0..10 {
            c.load(&format!("k{i}"), &i.to_string()).unwrap();
        }
        c.set_max_size(4);
        assert_eq!(c.max_size(), 4);
        assert_eq!(c.len(), 10);
        c.load("new", &"n".to_string()).unwrap();
        assert!(c.len() <= 4);
        assert!(c.contains("new"));
    }

    #[test]
    fn zero_capacity_uses_default() {
        let c = cache(0);
        assert_eq!(c.max_size(), DEFAULT_MAX_SIZE);
        c.set_max_size(0);
        assert_eq!(c.max_size(), DEFAULT_MAX_SIZE);
    }

    #[test]
    fn concurrent_loads_respect_bound() {
        let c = Arc::new(cache(16));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("t{t}-{i}");
                        c.load(&key, &key).unwrap();
                        assert!(c.len() <= 16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert!(c.len() <= 16);
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(max in 1usize..40, keys in proptest::collection::vec(0u16..200, 0..300)) {
            let c = cache(max);
            for key in keys {
                let key = key.to_string();
                if c.contains(&key) {
                    c.update(&key, &key).unwrap();
                } else {
                    c.load(&key, &key).unwrap();
                }
                prop_assert!(c.len() <= max);
            }
        }

        #[test]
        fn eviction_removes_oldest_first(max in 2usize..30, extra in 1usize..30) {
            let c = cache(max);
            let total = max + extra;
            for i in 0..total {
                c.load(&i.to_string(), &i.to_string()).unwrap();
            }
            let kept: Vec<usize> = c.keys().iter().map(|k| k.parse().unwrap()).collect();
            // Survivors are a contiguous run ending at the newest key.
            prop_assert_eq!(*kept.last().unwrap(), total - 1);
            for pair in kept.windows(2) {
                prop_assert_eq!(pair[0] + 1, pair[1]);
            }
        }
    }
}

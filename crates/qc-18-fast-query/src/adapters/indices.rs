//! # Derived Indices
//!
//! Read accelerators updated by the persistence worker inside the same apply
//! step as the store write, so a reader never finds an index entry that is
//! newer or older than the store.
//!
//! - state LRU: full state key → slot value
//! - code LRU: code hash → bytecode (filled on read)
//! - params: last persisted `EvmParams`
//!
//! Readers may also fill an index from what they read in the store, but only
//! through `fill`, which refuses the value once any write has reached the
//! index since the reader took its `generation()` snapshot. The worker writes
//! the store before it touches the index, so a refused fill is always one
//! that could have been older than the store.

use std::hash::Hash as StdHash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use shared_types::EvmParams;

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug)]
struct Generational<T> {
    generation: u64,
    value: T,
}

impl<T> Generational<T> {
    fn new(value: T) -> Self {
        Self {
            generation: 0,
            value,
        }
    }

    fn written(&mut self) -> &mut T {
        self.generation = self.generation.wrapping_add(1);
        &mut self.value
    }
}

/// Thread-safe LRU. `get` bumps recency, so reads take the lock exclusively.
#[derive(Debug)]
pub struct SharedLru<K: StdHash + Eq, V> {
    inner: Mutex<Generational<LruCache<K, V>>>,
}

impl<K: StdHash + Eq, V: Clone> SharedLru<K, V> {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_CAPACITY);
        Self {
            inner: Mutex::new(Generational::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().value.get(key).cloned()
    }

    /// Write counter; changes on every `put`, `evict` and `clear`.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().written().put(key, value);
    }

    /// Read-path fill. Dropped when the index was written after `seen`.
    pub fn fill(&self, seen: u64, key: K, value: V) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != seen {
            return false;
        }
        inner.value.put(key, value);
        true
    }

    pub fn evict(&self, key: &K) -> Option<V> {
        self.inner.lock().written().pop(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().value.is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().written().clear();
    }
}

#[derive(Debug)]
pub struct ParamsCache {
    params: RwLock<Generational<Option<EvmParams>>>,
}

impl Default for ParamsCache {
    fn default() -> Self {
        Self {
            params: RwLock::new(Generational::new(None)),
        }
    }
}

impl ParamsCache {
    pub fn get(&self) -> Option<EvmParams> {
        self.params.read().value.clone()
    }

    pub fn generation(&self) -> u64 {
        self.params.read().generation
    }

    pub fn set(&self, params: EvmParams) {
        *self.params.write().written() = Some(params);
    }

    pub fn fill(&self, seen: u64, params: EvmParams) -> bool {
        let mut inner = self.params.write();
        if inner.generation != seen {
            return false;
        }
        inner.value = Some(params);
        true
    }

    pub fn clear(&self) {
        *self.params.write().written() = None;
    }
}

/// Indices shared by the worker (writer) and the querier (reader).
#[derive(Debug)]
pub struct DerivedIndices {
    pub state: SharedLru<Vec<u8>, Vec<u8>>,
    pub code: SharedLru<Vec<u8>, Vec<u8>>,
    pub params: ParamsCache,
}

impl DerivedIndices {
    pub fn new(lru_size: usize) -> Arc<Self> {
        Arc::new(Self {
            state: SharedLru::new(lru_size),
            code: SharedLru::new(lru_size),
            params: ParamsCache::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_least_recent() {
        let lru: SharedLru<u8, u8> = SharedLru::new(2);
        lru.put(1, 10);
        lru.put(2, 20);
        assert_eq!(lru.get(&1), Some(10));
        lru.put(3, 30);

        assert_eq!(lru.get(&2), None);
        assert_eq!(lru.get(&1), Some(10));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let lru: SharedLru<u8, u8> = SharedLru::new(0);
        lru.put(1, 1);
        assert_eq!(lru.get(&1), Some(1));
    }

    #[test]
    fn test_evict_and_params() {
        let indices = DerivedIndices::new(8);
        indices.state.put(vec![0x08, 0x01], vec![0x01]);
        assert_eq!(indices.state.evict(&vec![0x08, 0x01]), Some(vec![0x01]));
        assert!(indices.state.is_empty());

        assert!(indices.params.get().is_none());
        indices.params.set(EvmParams::default());
        assert_eq!(indices.params.get(), Some(EvmParams::default()));
    }

    #[test]
    fn test_fill_refused_after_intervening_write() {
        let lru: SharedLru<u8, &str> = SharedLru::new(4);
        let seen = lru.generation();
        lru.put(1, "new");

        assert!(!lru.fill(seen, 1, "old"));
        assert_eq!(lru.get(&1), Some("new"));

        let seen = lru.generation();
        assert!(lru.fill(seen, 2, "read"));
        assert_eq!(lru.get(&2), Some("read"));
        // Fills are not writes: a second reader with the same snapshot still fills.
        assert!(lru.fill(seen, 3, "read"));
    }

    #[test]
    fn test_fill_refused_after_evict() {
        let lru: SharedLru<u8, u8> = SharedLru::new(4);
        let seen = lru.generation();
        lru.evict(&1);
        assert!(!lru.fill(seen, 1, 1));
        assert_eq!(lru.get(&1), None);
    }

    #[test]
    fn test_params_fill_refused_after_clear() {
        let params = ParamsCache::default();
        let seen = params.generation();
        params.clear();
        assert!(!params.fill(seen, EvmParams::default()));
        assert!(params.get().is_none());
    }
}

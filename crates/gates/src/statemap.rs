//! Keyed governance state behind a single lock.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

/// A keyed map of governance state with one lock per map.
///
/// Entries are created lazily on first observation of a key. The lock is
/// held only for the duration of a closure, which must not perform I/O, so
/// a prune-check-record sequence runs as one critical section.
#[derive(Debug, Default)]
pub struct StateMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Default> StateMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the entry for `key`, inserting a default first if absent.
    pub fn with<R>(&self, key: K, f: impl FnOnce(&mut V) -> R) -> R {
        let mut map = self.inner.lock();
        f(map.entry(key).or_default())
    }

    /// Run `f` against the entry for `key` if it exists.
    pub fn with_existing<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut map = self.inner.lock();
        map.get_mut(key).map(f)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Keep only entries for which `f` returns true; returns how many
    /// entries were dropped.
    pub fn retain(&self, f: impl FnMut(&K, &mut V) -> bool) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(f);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

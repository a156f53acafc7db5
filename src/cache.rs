//! Expiring, process-wide cache with single-flight population.
//!
//! Each key owns a slot guarded by its own mutex. A caller that finds the
//! slot stale populates it while holding that slot's lock, so concurrent
//! misses on one key wait for a single population instead of each invoking
//! the external tools. Failed populations store nothing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

pub struct TtlCache<K, V> {
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.value.clone())
    }

    /// Returns the fresh value for `key`, running `populate` on a miss.
    /// An `Err` from `populate` is passed through and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, populate: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = guard.as_ref().filter(|entry| self.is_fresh(entry)) {
            return Ok(entry.value.clone());
        }
        let value = populate()?;
        *guard = Some(Entry {
            value: value.clone(),
            stored_at: Instant::now(),
        });
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn slot(&self, key: K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key).or_default().clone()
    }

    fn is_fresh(&self, entry: &Entry<V>) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }
}

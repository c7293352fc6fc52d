//! Time-boxed cache.
//!
//! Entries are `(value, stored_at)` pairs. Reads go through [`TtlCache::get`],
//! which treats anything older than the TTL as absent. Invalidation is
//! explicit and must happen before the next dependent read.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

use crate::time::Millis;

#[derive(Clone, Debug)]
struct CachedValue<V> {
    value: V,
    stored_at: Millis,
}

/// A map whose entries expire after a fixed time-to-live.
#[derive(Clone, Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CachedValue<V>>,
    ttl_ms: u64,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    /// Creates an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
        }
    }

    /// Returns the configured TTL in milliseconds.
    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Gets a value if it is still fresh at `now`.
    #[must_use]
    pub fn get(&self, key: &K, now: Millis) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|c| now.since(c.stored_at) < self.ttl_ms)
            .map(|c| &c.value)
    }

    /// Stores a value computed at `now`.
    pub fn insert(&mut self, key: K, value: V, now: Millis) {
        self.entries.insert(
            key,
            CachedValue {
                value,
                stored_at: now,
            },
        );
    }

    /// Gets a fresh value or computes, stores, and returns a new one.
    ///
    /// # Errors
    ///
    /// Propagates the error from `compute`; nothing is stored in that case.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        now: Millis,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        let ttl = self.ttl_ms;
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                if now.since(slot.get().stored_at) >= ttl {
                    let value = compute()?;
                    slot.insert(CachedValue {
                        value,
                        stored_at: now,
                    });
                }
                Ok(&slot.into_mut().value)
            }
            Entry::Vacant(slot) => {
                let value = compute()?;
                Ok(&slot
                    .insert(CachedValue {
                        value,
                        stored_at: now,
                    })
                    .value)
            }
        }
    }

    /// Removes one entry. Returns true if it was present.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Millis) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries.retain(|_, c| now.since(c.stored_at) < ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

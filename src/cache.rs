//! Time-boxed result cache.
//!
//! Entries expire a fixed duration after insertion and are recomputed by
//! the caller on the next miss. The clock is injected so expiry can be
//! driven deterministically in tests.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

pub struct TtlCache<K, V, C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash,
    V: Clone,
    C: Clock,
{
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    /// Returns a fresh entry; an expired one is dropped and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let fresh = self
            .entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)?;

        if fresh {
            self.entries.get(key).map(|entry| entry.value.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries.insert(key, CacheEntry { value, stored_at });
    }

    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

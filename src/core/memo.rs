use std::{hash::Hash, sync::Arc};

use hashbrown::HashMap;

use crate::types::{Clock, TimestampMs};

/// Memoized values with an explicit freshness window.
///
/// Owned by whoever needs it; there is no process-wide instance.
pub struct TtlCache<K, V> {
    entries: HashMap<K, (V, TimestampMs)>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
            clock,
        }
    }

    /// Returns the value if stored less than `ttl_ms` ago.
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .filter(|(_, stored_at)| now.saturating_sub(*stored_at) < self.ttl_ms)
            .map(|(v, _)| v.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        let now = self.clock.now_ms();
        self.entries.insert(key, (value, now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every expired entry.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, stored_at)| now.saturating_sub(*stored_at) < ttl);
        before - self.entries.len()
    }
}

//! Volatile backend with the same contract as the SQLite one.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::{
    op::OutboxEntry,
    types::{OutboxSeq, TimestampMs},
};

use super::{KvBackend, LeaseBackend, OutboxBackend, PersistResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    kv: HashMap<String, Vec<u8>>,
    outbox: BTreeMap<OutboxSeq, OutboxEntry>,
    dead: BTreeMap<OutboxSeq, OutboxEntry>,
    leases: HashMap<String, (String, TimestampMs)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryStore {
    fn get_raw(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        Ok(self.kv.get(key).cloned())
    }

    fn set_raw(&mut self, key: &str, value: &[u8]) -> PersistResult<()> {
        self.kv.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> PersistResult<bool> {
        Ok(self.kv.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> PersistResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .kv
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl OutboxBackend for MemoryStore {
    fn append_entry(&mut self, entry: &OutboxEntry) -> PersistResult<OutboxSeq> {
        let live = self.outbox.keys().next_back().copied().unwrap_or(0);
        let dead = self.dead.keys().next_back().copied().unwrap_or(0);
        let seq = live.max(dead) + 1;
        self.outbox.insert(
            seq,
            OutboxEntry {
                seq,
                ..entry.clone()
            },
        );
        Ok(seq)
    }

    fn update_entry(&mut self, entry: &OutboxEntry) -> PersistResult<()> {
        if let Some(slot) = self.outbox.get_mut(&entry.seq) {
            *slot = entry.clone();
        }
        Ok(())
    }

    fn remove_entry(&mut self, seq: OutboxSeq) -> PersistResult<bool> {
        Ok(self.outbox.remove(&seq).is_some())
    }

    fn load_pending(&self) -> PersistResult<Vec<OutboxEntry>> {
        Ok(self.outbox.values().cloned().collect())
    }

    fn dead_letter(&mut self, entry: &OutboxEntry, _failed_at_ms: TimestampMs) -> PersistResult<()> {
        self.outbox.remove(&entry.seq);
        self.dead.insert(entry.seq, entry.clone());
        Ok(())
    }

    fn load_dead_letters(&self) -> PersistResult<Vec<OutboxEntry>> {
        Ok(self.dead.values().cloned().collect())
    }
}

impl LeaseBackend for MemoryStore {
    fn try_acquire_lease(
        &mut self,
        name: &str,
        holder: &str,
        now_ms: TimestampMs,
        ttl_ms: u64,
    ) -> PersistResult<bool> {
        if let Some((current, until)) = self.leases.get(name) {
            if current != holder && *until > now_ms {
                return Ok(false);
            }
        }
        self.leases.insert(
            name.to_string(),
            (holder.to_string(), now_ms.saturating_add(ttl_ms)),
        );
        Ok(true)
    }

    fn release_lease(&mut self, name: &str, holder: &str) -> PersistResult<()> {
        if self.leases.get(name).is_some_and(|(h, _)| h == holder) {
            self.leases.remove(name);
        }
        Ok(())
    }
}

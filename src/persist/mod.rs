/// In-memory backend for tests and ephemeral sessions.
pub mod memory;
/// SQLite backend.
pub mod sqlite;

use crate::{
    op::OutboxEntry,
    types::{OutboxSeq, TimestampMs},
};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable string-keyed byte storage.
pub trait KvBackend: Send {
    fn get_raw(&self, key: &str) -> PersistResult<Option<Vec<u8>>>;
    fn set_raw(&mut self, key: &str, value: &[u8]) -> PersistResult<()>;
    fn remove(&mut self, key: &str) -> PersistResult<bool>;
    fn keys_with_prefix(&self, prefix: &str) -> PersistResult<Vec<String>>;
}

/// Durable FIFO of pending remote writes plus its dead-letter table.
pub trait OutboxBackend: Send {
    /// Appends `entry` under a store-assigned sequence and returns it.
    ///
    /// `entry.seq` is ignored. Sequences keep rising across dead letters and
    /// across every handle sharing the store.
    fn append_entry(&mut self, entry: &OutboxEntry) -> PersistResult<OutboxSeq>;
    /// Rewrites retry bookkeeping (attempts, next attempt, last error).
    fn update_entry(&mut self, entry: &OutboxEntry) -> PersistResult<()>;
    fn remove_entry(&mut self, seq: OutboxSeq) -> PersistResult<bool>;
    /// Pending entries in ascending `seq` order.
    fn load_pending(&self) -> PersistResult<Vec<OutboxEntry>>;
    /// Moves an entry out of the queue into the dead-letter table atomically.
    fn dead_letter(&mut self, entry: &OutboxEntry, failed_at_ms: TimestampMs) -> PersistResult<()>;
    fn load_dead_letters(&self) -> PersistResult<Vec<OutboxEntry>>;
}

/// Named expiring leases used to elect a single outbox drainer.
pub trait LeaseBackend: Send {
    /// Takes or renews `name` for `holder`; false while another holder's lease is live.
    fn try_acquire_lease(
        &mut self,
        name: &str,
        holder: &str,
        now_ms: TimestampMs,
        ttl_ms: u64,
    ) -> PersistResult<bool>;
    fn release_lease(&mut self, name: &str, holder: &str) -> PersistResult<()>;
}

/// Everything the sync runtime needs from local storage.
pub trait LocalStore: KvBackend + OutboxBackend + LeaseBackend {}

impl<T: KvBackend + OutboxBackend + LeaseBackend> LocalStore for T {}

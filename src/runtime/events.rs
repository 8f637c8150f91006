//! Runtime event stream payloads.

use crate::types::{CacheKey, OutboxSeq, TimestampMs};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A cached list was rewritten.
    CacheUpdated {
        /// List that changed.
        key: CacheKey,
    },
    /// A write was queued for later replay.
    Enqueued {
        /// Queue position.
        seq: OutboxSeq,
        /// `insert`, `update` or `delete`.
        operation: &'static str,
    },
    /// A queued write reached the remote.
    Replayed {
        /// Acknowledged entry.
        seq: OutboxSeq,
    },
    /// A replay failed and will be retried.
    ReplayFailed {
        /// Entry that failed.
        seq: OutboxSeq,
        /// Failures so far.
        attempts: u32,
        /// When the next attempt may run.
        next_attempt_at_ms: TimestampMs,
    },
    /// An entry was moved to the dead-letter table.
    DeadLettered {
        /// Entry that was given up on.
        seq: OutboxSeq,
        /// Last remote error.
        error: String,
    },
    /// Connectivity flipped.
    ConnectivityChanged {
        /// New state.
        online: bool,
    },
    /// The outbox became empty.
    OutboxDrained,
}

//! Local cache, outbox queue and reconciliation primitives.

/// Typed key-value access and the cached-list envelope.
pub mod kv;
/// Freshness-bounded memoization.
pub mod memo;
/// Durable FIFO of pending remote writes.
pub mod outbox;
/// List upsert/merge rules and page-load states.
pub mod reconcile;

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde_json::Value;

use crate::{
    op::{OutboxEntry, OutboxOp},
    persist::{OutboxBackend, PersistError, PersistResult},
    types::{OutboxSeq, RecordId, TimestampMs},
};

/// Exponential backoff with a dead-letter threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Failures after which an entry is dead-lettered.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 5 * 60 * 1_000,
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failure number `attempts` (1-based).
    pub fn delay_for(&self, attempts: u32) -> u64 {
        let exp = attempts.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        self.base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }
}

/// What happened to an entry after a failed replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retry {
        attempts: u32,
        next_attempt_at_ms: TimestampMs,
    },
    DeadLettered {
        attempts: u32,
    },
}

/// Ids touched by pending entries of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingIds {
    pub upserts: HashSet<RecordId>,
    pub deletes: HashSet<RecordId>,
}

/// In-memory mirror of the durable queue. Every mutation hits the backend first.
#[derive(Debug)]
pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
    policy: RetryPolicy,
}

impl Outbox {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            policy,
        }
    }

    /// Restores pending entries in sequence order.
    pub fn load<B: OutboxBackend + ?Sized>(backend: &B, policy: RetryPolicy) -> PersistResult<Self> {
        let entries: VecDeque<OutboxEntry> = backend.load_pending()?.into();
        Ok(Self { entries, policy })
    }

    /// Replaces the mirror with what the backend holds now.
    ///
    /// Other handles on the same store may have appended or drained entries.
    pub fn reload<B: OutboxBackend + ?Sized>(&mut self, backend: &B) -> PersistResult<()> {
        self.entries = backend.load_pending()?.into();
        Ok(())
    }

    pub fn enqueue<B: OutboxBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        op: OutboxOp,
        now_ms: TimestampMs,
    ) -> PersistResult<OutboxSeq> {
        let mut entry = OutboxEntry::new(0, now_ms, op);
        entry.seq = backend.append_entry(&entry)?;
        let seq = entry.seq;
        self.entries.push_back(entry);
        Ok(seq)
    }

    /// Enqueues by operation name and JSON payload.
    pub fn enqueue_named<B: OutboxBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        operation: &str,
        payload: Value,
        now_ms: TimestampMs,
    ) -> PersistResult<OutboxSeq> {
        let op = OutboxOp::from_parts(operation, payload)?;
        self.enqueue(backend, op, now_ms)
    }

    pub fn head(&self) -> Option<&OutboxEntry> {
        self.entries.front()
    }

    /// The head entry, if its backoff window has elapsed.
    pub fn head_ready(&self, now_ms: TimestampMs) -> Option<&OutboxEntry> {
        self.entries
            .front()
            .filter(|e| e.next_attempt_at_ms <= now_ms)
    }

    /// Earliest time the head may be replayed.
    pub fn next_due_at(&self) -> Option<TimestampMs> {
        self.entries.front().map(|e| e.next_attempt_at_ms)
    }

    /// Removes an acknowledged entry.
    pub fn ack<B: OutboxBackend + ?Sized>(&mut self, backend: &mut B, seq: OutboxSeq) -> PersistResult<bool> {
        let removed = backend.remove_entry(seq)?;
        if let Some(pos) = self.entries.iter().position(|e| e.seq == seq) {
            self.entries.remove(pos);
            return Ok(true);
        }
        Ok(removed)
    }

    pub fn record_failure<B: OutboxBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        seq: OutboxSeq,
        error: &str,
        now_ms: TimestampMs,
    ) -> PersistResult<FailureOutcome> {
        let pos = self.position(seq)?;
        let mut entry = self.entries[pos].clone();
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_error = Some(error.to_string());

        if entry.attempts >= self.policy.max_attempts {
            backend.dead_letter(&entry, now_ms)?;
            self.entries.remove(pos);
            return Ok(FailureOutcome::DeadLettered {
                attempts: entry.attempts,
            });
        }

        entry.next_attempt_at_ms = now_ms.saturating_add(self.policy.delay_for(entry.attempts));
        backend.update_entry(&entry)?;
        let outcome = FailureOutcome::Retry {
            attempts: entry.attempts,
            next_attempt_at_ms: entry.next_attempt_at_ms,
        };
        self.entries[pos] = entry;
        Ok(outcome)
    }

    /// Dead-letters an entry the remote will never accept.
    pub fn dead_letter_now<B: OutboxBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        seq: OutboxSeq,
        error: &str,
        now_ms: TimestampMs,
    ) -> PersistResult<()> {
        let pos = self.position(seq)?;
        let mut entry = self.entries[pos].clone();
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_error = Some(error.to_string());
        backend.dead_letter(&entry, now_ms)?;
        self.entries.remove(pos);
        Ok(())
    }

    /// Ids with a pending write against `table`.
    ///
    /// An id whose latest pending entry is a delete lands in `deletes` only.
    pub fn pending_ids(&self, table: &str) -> PendingIds {
        let mut out = PendingIds::default();
        for entry in self.entries.iter().filter(|e| e.op.table() == table) {
            let id = entry.op.record_id();
            match entry.op {
                OutboxOp::Delete { .. } => {
                    out.upserts.remove(&id);
                    out.deletes.insert(id);
                }
                OutboxOp::Insert { .. } | OutboxOp::Update { .. } => {
                    out.deletes.remove(&id);
                    out.upserts.insert(id);
                }
            }
        }
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, seq: OutboxSeq) -> PersistResult<usize> {
        self.entries
            .iter()
            .position(|e| e.seq == seq)
            .ok_or_else(|| PersistError::Message(format!("outbox entry {seq} not pending")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::persist::memory::MemoryStore;

    fn delete_op(id: RecordId) -> OutboxOp {
        OutboxOp::Delete {
            table: "animais".to_string(),
            id,
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for(1), 100);
        assert_eq!(policy.delay_for(2), 200);
        assert_eq!(policy.delay_for(4), 800);
        assert_eq!(policy.delay_for(5), 1_000);
        assert_eq!(policy.delay_for(200), 1_000);
    }

    #[test]
    fn failed_head_stays_in_place_until_dead_lettered() {
        let mut backend = MemoryStore::new();
        let policy = RetryPolicy {
            base_delay_ms: 10,
            max_delay_ms: 10,
            max_attempts: 2,
        };
        let mut outbox = Outbox::new(policy);
        let first = outbox.enqueue(&mut backend, delete_op(Uuid::new_v4()), 0).unwrap();
        let second = outbox.enqueue(&mut backend, delete_op(Uuid::new_v4()), 0).unwrap();

        let outcome = outbox.record_failure(&mut backend, first, "timeout", 5).unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Retry {
                attempts: 1,
                next_attempt_at_ms: 15
            }
        );
        assert!(outbox.head_ready(10).is_none());
        assert_eq!(outbox.head_ready(15).map(|e| e.seq), Some(first));

        let outcome = outbox.record_failure(&mut backend, first, "timeout", 20).unwrap();
        assert_eq!(outcome, FailureOutcome::DeadLettered { attempts: 2 });
        assert_eq!(outbox.head().map(|e| e.seq), Some(second));
        assert_eq!(backend.load_dead_letters().unwrap().len(), 1);
    }

    #[test]
    fn named_enqueue_and_pending_ids() {
        let mut backend = MemoryStore::new();
        let mut outbox = Outbox::new(RetryPolicy::default());
        let kept = Uuid::new_v4();
        let gone = Uuid::new_v4();

        outbox
            .enqueue_named(
                &mut backend,
                "insert",
                json!({"table": "animais", "row": {"id": kept, "brinco": "7"}}),
                1,
            )
            .unwrap();
        outbox
            .enqueue_named(&mut backend, "insert", json!({"table": "animais", "row": {"id": gone}}), 2)
            .unwrap();
        outbox.enqueue(&mut backend, delete_op(gone), 3).unwrap();

        let pending = outbox.pending_ids("animais");
        assert!(pending.upserts.contains(&kept));
        assert!(!pending.upserts.contains(&gone));
        assert!(pending.deletes.contains(&gone));
        assert!(outbox.pending_ids("financeiro").upserts.is_empty());
    }

    #[test]
    fn reload_continues_sequence_after_dead_letters() {
        let mut backend = MemoryStore::new();
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let mut outbox = Outbox::new(policy);
        let seq = outbox.enqueue(&mut backend, delete_op(Uuid::new_v4()), 0).unwrap();
        outbox.record_failure(&mut backend, seq, "boom", 1).unwrap();

        let mut reloaded = Outbox::load(&backend, policy).unwrap();
        assert!(reloaded.is_empty());
        let next = reloaded.enqueue(&mut backend, delete_op(Uuid::new_v4()), 2).unwrap();
        assert_eq!(next, seq + 1);
    }

    #[test]
    fn mirrors_sharing_a_backend_never_reuse_a_seq() {
        let mut backend = MemoryStore::new();
        let mut tab_a = Outbox::load(&backend, RetryPolicy::default()).unwrap();
        let mut tab_b = Outbox::load(&backend, RetryPolicy::default()).unwrap();

        let a = tab_a.enqueue(&mut backend, delete_op(Uuid::new_v4()), 0).unwrap();
        let b = tab_b.enqueue(&mut backend, delete_op(Uuid::new_v4()), 0).unwrap();
        assert_eq!((a, b), (1, 2));

        tab_a.reload(&backend).unwrap();
        let seqs: Vec<OutboxSeq> = tab_a.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn next_due_follows_the_head_backoff() {
        let mut backend = MemoryStore::new();
        let policy = RetryPolicy {
            base_delay_ms: 500,
            max_delay_ms: 500,
            max_attempts: 5,
        };
        let mut outbox = Outbox::new(policy);
        assert_eq!(outbox.next_due_at(), None);

        let seq = outbox.enqueue(&mut backend, delete_op(Uuid::new_v4()), 100).unwrap();
        assert_eq!(outbox.next_due_at(), Some(100));
        outbox.record_failure(&mut backend, seq, "timeout", 200).unwrap();
        assert_eq!(outbox.next_due_at(), Some(700));
    }
}

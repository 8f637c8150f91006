//! SQLite-backed key-value cache, outbox queue and drain leases.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    op::{OutboxEntry, OutboxEntryEnvelope, decode_op_payload},
    types::{OutboxSeq, TimestampMs},
};

use super::{KvBackend, LeaseBackend, OutboxBackend, PersistResult};

/// SQLite implementation of [`crate::persist::LocalStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    fn load_entries(&self, sql: &str) -> PersistResult<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_entry)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl KvBackend for SqliteStore {
    fn get_raw(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_raw(&mut self, key: &str, value: &[u8]) -> PersistResult<()> {
        self.conn.execute(
            "INSERT INTO kv(key, value, updated_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            params![key, value, now_ms() as i64],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> PersistResult<bool> {
        let count = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(count > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> PersistResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC")?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl OutboxBackend for SqliteStore {
    fn append_entry(&mut self, entry: &OutboxEntry) -> PersistResult<OutboxSeq> {
        let payload = serde_json::to_vec(&OutboxEntryEnvelope::new(entry.op.clone()))?;
        // One statement, so the seq is picked and claimed under the same write lock.
        self.conn.execute(
            "INSERT INTO outbox(seq, created_at_ms, operation, record_id, payload, attempts, next_attempt_at_ms, last_error)
             SELECT COALESCE(MAX(seq), 0) + 1, ?1, ?2, ?3, ?4, ?5, ?6, ?7
             FROM (SELECT seq FROM outbox UNION ALL SELECT seq FROM dead_letters)",
            params![
                entry.created_at_ms as i64,
                entry.op.name(),
                entry.op.record_id().to_string(),
                payload,
                entry.attempts,
                entry.next_attempt_at_ms as i64,
                entry.last_error,
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as OutboxSeq)
    }

    fn update_entry(&mut self, entry: &OutboxEntry) -> PersistResult<()> {
        self.conn.execute(
            "UPDATE outbox SET attempts = ?2, next_attempt_at_ms = ?3, last_error = ?4 WHERE seq = ?1",
            params![
                entry.seq as i64,
                entry.attempts,
                entry.next_attempt_at_ms as i64,
                entry.last_error,
            ],
        )?;
        Ok(())
    }

    fn remove_entry(&mut self, seq: OutboxSeq) -> PersistResult<bool> {
        let count = self
            .conn
            .execute("DELETE FROM outbox WHERE seq = ?1", params![seq as i64])?;
        Ok(count > 0)
    }

    fn load_pending(&self) -> PersistResult<Vec<OutboxEntry>> {
        self.load_entries(
            "SELECT seq, created_at_ms, payload, attempts, next_attempt_at_ms, last_error
             FROM outbox ORDER BY seq ASC",
        )
    }

    fn dead_letter(&mut self, entry: &OutboxEntry, failed_at_ms: TimestampMs) -> PersistResult<()> {
        let payload = serde_json::to_vec(&OutboxEntryEnvelope::new(entry.op.clone()))?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM outbox WHERE seq = ?1", params![entry.seq as i64])?;
        tx.execute(
            "INSERT OR REPLACE INTO dead_letters(seq, created_at_ms, operation, record_id, payload, attempts, last_error, failed_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.seq as i64,
                entry.created_at_ms as i64,
                entry.op.name(),
                entry.op.record_id().to_string(),
                payload,
                entry.attempts,
                entry.last_error,
                failed_at_ms as i64,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_dead_letters(&self) -> PersistResult<Vec<OutboxEntry>> {
        self.load_entries(
            "SELECT seq, created_at_ms, payload, attempts, failed_at_ms, last_error
             FROM dead_letters ORDER BY seq ASC",
        )
    }
}

impl LeaseBackend for SqliteStore {
    fn try_acquire_lease(
        &mut self,
        name: &str,
        holder: &str,
        now_ms: TimestampMs,
        ttl_ms: u64,
    ) -> PersistResult<bool> {
        let expires = now_ms.saturating_add(ttl_ms);
        let changed = self.conn.execute(
            "INSERT INTO leases(name, holder, expires_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at_ms = excluded.expires_at_ms
             WHERE leases.holder = excluded.holder OR leases.expires_at_ms <= ?4",
            params![name, holder, expires as i64, now_ms as i64],
        )?;
        Ok(changed == 1)
    }

    fn release_lease(&mut self, name: &str, holder: &str) -> PersistResult<()> {
        self.conn.execute(
            "DELETE FROM leases WHERE name = ?1 AND holder = ?2",
            params![name, holder],
        )?;
        Ok(())
    }
}

// Dead-letter rows reuse the `next_attempt_at_ms` slot for their failure time.
fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<OutboxEntry> {
    let seq: i64 = row.get(0)?;
    let created_at_ms: i64 = row.get(1)?;
    let payload: Vec<u8> = row.get(2)?;
    let attempts: u32 = row.get(3)?;
    let next_attempt_at_ms: i64 = row.get(4)?;
    let last_error: Option<String> = row.get(5)?;

    let op = decode_op_payload(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Blob,
            Box::new(std::io::Error::other(err)),
        )
    })?;

    Ok(OutboxEntry {
        seq: seq as OutboxSeq,
        created_at_ms: created_at_ms as TimestampMs,
        op,
        attempts,
        next_attempt_at_ms: next_attempt_at_ms as TimestampMs,
        last_error,
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

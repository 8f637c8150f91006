//! Outbox operation model and persistence wrappers.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    record::{Record, RecordPatch},
    types::{OutboxSeq, RecordId, TimestampMs},
};

/// Version number for serialized [`OutboxEntryEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Pending write against the remote, serialized as `{operation, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "lowercase")]
pub enum OutboxOp {
    /// Insert a row whose id was assigned on the client.
    Insert {
        /// Remote table.
        table: String,
        /// Full row.
        row: Record,
    },
    /// Patch an existing row.
    Update {
        /// Remote table.
        table: String,
        /// Row id.
        id: RecordId,
        /// Fields to overwrite.
        patch: RecordPatch,
    },
    /// Delete a row.
    Delete {
        /// Remote table.
        table: String,
        /// Row id.
        id: RecordId,
    },
}

impl OutboxOp {
    /// Rebuilds an operation from its name and payload.
    pub fn from_parts(operation: &str, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "operation": operation, "payload": payload }))
    }

    /// Operation name as stored.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Remote table the operation targets.
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            }
        }
    }

    /// Id of the affected row.
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Insert { row, .. } => row.id,
            Self::Update { id, .. } | Self::Delete { id, .. } => *id,
        }
    }
}

/// Queue row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    /// Monotonic position in the queue.
    pub seq: OutboxSeq,
    /// Enqueue time.
    pub created_at_ms: TimestampMs,
    /// Operation body.
    pub op: OutboxOp,
    /// Failed replay attempts so far.
    pub attempts: u32,
    /// Earliest time the next replay may run.
    pub next_attempt_at_ms: TimestampMs,
    /// Last replay error, if any.
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// A fresh entry, ready for immediate replay.
    pub fn new(seq: OutboxSeq, created_at_ms: TimestampMs, op: OutboxOp) -> Self {
        Self {
            seq,
            created_at_ms,
            op,
            attempts: 0,
            next_attempt_at_ms: created_at_ms,
            last_error: None,
        }
    }
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntryEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub op: OutboxOp,
}

impl OutboxEntryEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(op: OutboxOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            op,
        }
    }
}

/// Decodes an operation payload, accepting bare pre-envelope payloads too.
pub fn decode_op_payload(payload: &[u8]) -> Result<OutboxOp, String> {
    if let Ok(envelope) = serde_json::from_slice::<OutboxEntryEnvelope>(payload) {
        if envelope.format_version != OP_FORMAT_VERSION {
            return Err(format!(
                "unsupported op format version: {}",
                envelope.format_version
            ));
        }
        return Ok(envelope.op);
    }

    serde_json::from_slice::<OutboxOp>(payload).map_err(|e| format!("op payload decode failed: {e}"))
}

//! Remote backend contract and idempotent outbox replay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    op::OutboxOp,
    record::{Record, RecordPatch},
    types::{FarmId, RecordId},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// No connectivity; nothing reached the server.
    #[error("offline")]
    Offline,
    #[error("transport: {0}")]
    Transport(String),
    /// Validation or constraint failure; retrying will not help.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Row with this id already exists.
    #[error("conflict on {0}")]
    Conflict(RecordId),
    #[error("not found: {0}")]
    NotFound(RecordId),
}

impl RemoteError {
    /// Whether the failure means the device should be treated as offline.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Offline | Self::Transport(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { column: String, value: Value },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// A tenant-scoped `select`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub table: String,
    pub farm_id: FarmId,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new(table: impl Into<String>, farm_id: impl Into<FarmId>) -> Self {
        Self {
            table: table.into(),
            farm_id: farm_id.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Row-oriented hosted database. Calls block; the runtime runs them off the async loop.
pub trait RemoteBackend: Send {
    fn fetch_list(&mut self, query: &ListQuery) -> RemoteResult<Vec<Record>>;
    fn insert(&mut self, table: &str, row: &Record) -> RemoteResult<Record>;
    fn update(&mut self, table: &str, id: RecordId, patch: &RecordPatch) -> RemoteResult<()>;
    fn delete(&mut self, table: &str, id: RecordId) -> RemoteResult<()>;
}

/// How a replayed entry was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAck {
    Applied,
    /// The remote already had the effect (duplicate insert, missing delete target).
    AlreadyApplied,
}

/// Applies one outbox operation. Safe to repeat: ids are assigned client-side.
pub fn replay_op(remote: &mut dyn RemoteBackend, op: &OutboxOp) -> RemoteResult<ReplayAck> {
    let result = match op {
        OutboxOp::Insert { table, row } => remote.insert(table, row).map(|_| ()),
        OutboxOp::Update { table, id, patch } => remote.update(table, *id, patch),
        OutboxOp::Delete { table, id } => remote.delete(table, *id),
    };

    match (op, result) {
        (_, Ok(())) => Ok(ReplayAck::Applied),
        (OutboxOp::Insert { row, .. }, Err(RemoteError::Conflict(id))) if id == row.id => {
            Ok(ReplayAck::AlreadyApplied)
        }
        (OutboxOp::Delete { id, .. }, Err(RemoteError::NotFound(missing))) if missing == *id => {
            Ok(ReplayAck::AlreadyApplied)
        }
        (_, Err(err)) => Err(err),
    }
}

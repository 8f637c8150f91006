//! Shared primitive IDs, cache keys and the clock abstraction.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Stable record identifier: a server UUID or one synthesized on the client.
pub type RecordId = uuid::Uuid;
/// Monotonic outbox sequence number.
pub type OutboxSeq = u64;
/// Tenant discriminator (one farm).
pub type FarmId = String;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Column the remote uses to scope every row to a farm.
pub const TENANT_COLUMN: &str = "fazenda_id";

/// Cache key scoped to one feature list of one farm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Feature/entity name, e.g. `animais` or `financeiro`.
    pub entity: String,
    /// Farm the list belongs to.
    pub farm_id: FarmId,
}

impl CacheKey {
    /// Builds a key for `entity` within `farm_id`.
    pub fn new(entity: impl Into<String>, farm_id: impl Into<FarmId>) -> Self {
        Self {
            entity: entity.into(),
            farm_id: farm_id.into(),
        }
    }

    /// Storage key used by the key-value backend.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.entity, self.farm_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.farm_id)
    }
}

/// Time source injected wherever freshness or backoff is computed.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the epoch.
    fn now_ms(&self) -> TimestampMs;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Starts the clock at `start_ms`.
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps to an absolute time.
    pub fn set(&self, ms: TimestampMs) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}

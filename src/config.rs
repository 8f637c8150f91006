//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::{core::outbox::RetryPolicy, repro::status::ReproSettings, sw::policy::AssetRules};

/// Tuning for the sync runtime. Every field has a default, so a partial JSON
/// document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often the drain loop wakes while online with pending entries.
    pub drain_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Failed replays before an entry is dead-lettered.
    pub max_attempts: u32,
    /// Freshness window for memoized list fetches.
    pub memo_ttl_ms: u64,
    pub drain_lease_ttl_ms: u64,
    pub command_queue_bound: usize,
    pub start_online: bool,
    /// Used by `SyncHandle::repro_summary`.
    pub repro: ReproSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 5_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 5 * 60 * 1_000,
            max_attempts: 8,
            memo_ttl_ms: 30_000,
            drain_lease_ttl_ms: 30_000,
            command_queue_bound: 256,
            start_online: true,
            repro: ReproSettings::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay_ms: self.backoff_base_ms,
            max_delay_ms: self.backoff_max_ms.max(self.backoff_base_ms),
            max_attempts: self.max_attempts.max(1),
        }
    }
}

/// Settings for one version of the asset worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetCacheConfig {
    /// Cache name; bumping it evicts every older cache on activate.
    pub version: String,
    /// Origin the worker is registered for.
    pub origin: String,
    /// Paths fetched and stored during install.
    pub precache: Vec<String>,
    /// Served when a document fetch fails and the page itself was never cached.
    pub offline_fallback: Option<String>,
    #[serde(flatten)]
    pub rules: AssetRules,
}

impl Default for AssetCacheConfig {
    fn default() -> Self {
        Self {
            version: "smartcow-v1".to_string(),
            origin: "http://localhost:5173".to_string(),
            precache: ["/", "/index.html", "/manifest.webmanifest", "/icons/icon-192.png", "/icons/icon-512.png"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            offline_fallback: Some("/index.html".to_string()),
            rules: AssetRules::default(),
        }
    }
}

impl AssetCacheConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

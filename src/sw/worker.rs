//! Install / activate / fetch lifecycle of one asset worker version.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::config::AssetCacheConfig;

use super::{
    cache::{AssetResponse, CacheStorage},
    manifest::{MANIFEST_PATH, WebManifest},
    policy::{AssetRequest, Strategy},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("offline")]
    Offline,
    #[error("network failure: {0}")]
    Failed(String),
}

/// Network side of the worker (the page's `fetch`).
pub trait AssetNetwork {
    fn fetch(&mut self, request: &AssetRequest) -> Result<AssetResponse, NetworkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed or a newer version replaced this one.
    Redundant,
}

#[derive(Debug, thiserror::Error)]
pub enum SwError {
    #[error("precache of {url} failed: {error}")]
    Precache { url: String, error: NetworkError },
    #[error("precache of {url} returned status {status}")]
    PrecacheStatus { url: String, status: u16 },
    #[error("worker is {actual:?}, expected {expected:?}")]
    InvalidState {
        actual: WorkerState,
        expected: WorkerState,
    },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("manifest encoding failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    /// Network failed; an older cached copy was used.
    CacheFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: AssetResponse,
    pub from: ServedFrom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidationReport {
    pub refreshed: usize,
    pub failed: usize,
}

pub struct AssetWorker {
    config: AssetCacheConfig,
    manifest: Option<WebManifest>,
    state: WorkerState,
    skip_waiting: bool,
    clients_claimed: bool,
    revalidate: VecDeque<AssetRequest>,
}

impl AssetWorker {
    pub fn new(config: AssetCacheConfig) -> Self {
        Self {
            config,
            manifest: None,
            state: WorkerState::Parsed,
            skip_waiting: false,
            clients_claimed: false,
            revalidate: VecDeque::new(),
        }
    }

    /// Serves `manifest` at [`MANIFEST_PATH`] instead of fetching it.
    pub fn with_manifest(mut self, manifest: WebManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    pub fn pending_revalidations(&self) -> usize {
        self.revalidate.len()
    }

    /// Precaches every configured path, all or nothing, then skips waiting.
    ///
    /// Any failed fetch leaves the worker [`WorkerState::Redundant`] and the
    /// version cache untouched.
    pub fn install(&mut self, storage: &mut CacheStorage, net: &mut dyn AssetNetwork) -> Result<(), SwError> {
        self.expect_state(WorkerState::Parsed)?;
        self.state = WorkerState::Installing;

        let mut staged = Vec::with_capacity(self.config.precache.len());
        for path in &self.config.precache {
            let request = AssetRequest::get(self.config.origin.as_str(), path.as_str());
            let response = match (&self.manifest, path.as_str()) {
                (Some(manifest), MANIFEST_PATH) => match manifest.to_response() {
                    Ok(response) => response,
                    Err(err) => {
                        self.state = WorkerState::Redundant;
                        return Err(err.into());
                    }
                },
                _ => match net.fetch(&request) {
                    Ok(response) => response,
                    Err(error) => {
                        warn!(version = %self.config.version, url = %request.url(), %error, "precache failed");
                        self.state = WorkerState::Redundant;
                        return Err(SwError::Precache {
                            url: request.url(),
                            error,
                        });
                    }
                },
            };
            if !response.is_cacheable() {
                self.state = WorkerState::Redundant;
                return Err(SwError::PrecacheStatus {
                    url: request.url(),
                    status: response.status,
                });
            }
            staged.push((request.url(), response));
        }

        let count = staged.len();
        let cache = storage.open(&self.config.version);
        for (url, response) in staged {
            cache.put(url, response);
        }
        self.skip_waiting = true;
        self.state = WorkerState::Installed;
        info!(version = %self.config.version, assets = count, "asset worker installed");
        Ok(())
    }

    /// Deletes every cache but the current version and claims open clients.
    /// Returns the names that were evicted.
    pub fn activate(&mut self, storage: &mut CacheStorage) -> Result<Vec<String>, SwError> {
        self.expect_state(WorkerState::Installed)?;
        self.state = WorkerState::Activating;

        let evicted: Vec<String> = storage
            .names()
            .into_iter()
            .filter(|name| *name != self.config.version)
            .collect();
        for name in &evicted {
            storage.delete(name);
        }

        self.clients_claimed = true;
        self.state = WorkerState::Activated;
        info!(version = %self.config.version, evicted = evicted.len(), "asset worker activated");
        Ok(evicted)
    }

    /// Handles one intercepted request. `Ok(None)` means the browser should
    /// handle it unaided.
    pub fn fetch(
        &mut self,
        storage: &mut CacheStorage,
        net: &mut dyn AssetNetwork,
        request: &AssetRequest,
    ) -> Result<Option<Served>, SwError> {
        if self.state != WorkerState::Activated {
            return Ok(None);
        }
        let strategy = self.config.rules.classify(request, &self.config.origin);
        debug!(url = %request.url(), ?strategy, "asset fetch");

        let served = match strategy {
            Strategy::Ignore => return Ok(None),
            Strategy::CacheFirst => self.cache_first(storage, net, request)?,
            Strategy::NetworkFirst => self.network_first(storage, net, request, true)?,
            Strategy::Passthrough => self.network_first(storage, net, request, false)?,
        };
        Ok(Some(served))
    }

    /// Refetches assets that were served from cache; a failure keeps the old copy.
    pub fn revalidate(&mut self, storage: &mut CacheStorage, net: &mut dyn AssetNetwork) -> RevalidationReport {
        let mut report = RevalidationReport::default();
        while let Some(request) = self.revalidate.pop_front() {
            match net.fetch(&request) {
                Ok(response) if response.is_cacheable() => {
                    storage.open(&self.config.version).put(request.url(), response);
                    report.refreshed += 1;
                }
                Ok(response) => {
                    debug!(url = %request.url(), status = response.status, "revalidation skipped");
                    report.failed += 1;
                }
                Err(error) => {
                    debug!(url = %request.url(), %error, "revalidation failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn cache_first(
        &mut self,
        storage: &mut CacheStorage,
        net: &mut dyn AssetNetwork,
        request: &AssetRequest,
    ) -> Result<Served, SwError> {
        let url = request.url();
        let hit = storage
            .get(&self.config.version)
            .and_then(|cache| cache.get(&url))
            .cloned();
        if let Some(response) = hit {
            if !self.revalidate.iter().any(|queued| queued.url() == url) {
                self.revalidate.push_back(request.clone());
            }
            return Ok(Served {
                response,
                from: ServedFrom::Cache,
            });
        }

        let response = net.fetch(request)?;
        if response.is_cacheable() {
            storage.open(&self.config.version).put(url, response.clone());
        }
        Ok(Served {
            response,
            from: ServedFrom::Network,
        })
    }

    fn network_first(
        &mut self,
        storage: &mut CacheStorage,
        net: &mut dyn AssetNetwork,
        request: &AssetRequest,
        document: bool,
    ) -> Result<Served, SwError> {
        let url = request.url();
        match net.fetch(request) {
            Ok(response) => {
                if response.is_cacheable() {
                    storage.open(&self.config.version).put(url, response.clone());
                }
                Ok(Served {
                    response,
                    from: ServedFrom::Network,
                })
            }
            Err(error) => {
                let fallback_url = self
                    .config
                    .offline_fallback
                    .as_deref()
                    .filter(|_| document)
                    .map(|path| format!("{}{}", self.config.origin, path));
                let cached = storage
                    .match_any(&url)
                    .or_else(|| fallback_url.as_deref().and_then(|u| storage.match_any(u)))
                    .cloned();
                match cached {
                    Some(response) => {
                        debug!(url = %url, %error, "network failed; serving cached copy");
                        Ok(Served {
                            response,
                            from: ServedFrom::CacheFallback,
                        })
                    }
                    None => Err(error.into()),
                }
            }
        }
    }

    fn expect_state(&self, expected: WorkerState) -> Result<(), SwError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SwError::InvalidState {
                actual: self.state,
                expected,
            })
        }
    }
}

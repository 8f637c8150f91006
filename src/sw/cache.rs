//! Named response caches, shared by every worker version of one origin.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// A stored or fetched response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// Only complete 200 responses are worth keeping.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    entries: HashMap<String, AssetResponse>,
}

impl AssetCache {
    pub fn get(&self, url: &str) -> Option<&AssetResponse> {
        self.entries.get(url)
    }

    pub fn put(&mut self, url: impl Into<String>, response: AssetResponse) {
        self.entries.insert(url.into(), response);
    }

    pub fn remove(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `CacheStorage`: caches keyed by version name.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: BTreeMap<String, AssetCache>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name`, creating it when absent.
    pub fn open(&mut self, name: &str) -> &mut AssetCache {
        self.caches.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&AssetCache> {
        self.caches.get(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Looks `url` up across every cache, oldest name first.
    pub fn match_any(&self, url: &str) -> Option<&AssetResponse> {
        self.caches.values().find_map(|cache| cache.get(url))
    }
}

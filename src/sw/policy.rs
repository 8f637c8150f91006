//! Request model and routing policy for the asset worker.

use serde::{Deserialize, Serialize};

use super::manifest::MANIFEST_PATH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

/// The subset of a browser `Request` the worker routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: Method,
    /// Scheme and host, e.g. `https://app.smartcow.com.br`.
    pub origin: String,
    /// Path plus optional query string.
    pub path: String,
    /// `mode == "navigate"`.
    pub navigate: bool,
    pub accept: Option<String>,
}

impl AssetRequest {
    pub fn get(origin: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            origin: origin.into(),
            path: path.into(),
            navigate: false,
            accept: None,
        }
    }

    pub fn navigate(origin: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            navigate: true,
            accept: Some("text/html".to_string()),
            ..Self::get(origin, path)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Cache key: origin and path, query included.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }

    /// Path without query string or fragment.
    pub fn pathname(&self) -> &str {
        let end = self.path.find(['?', '#']).unwrap_or(self.path.len());
        &self.path[..end]
    }

    pub fn is_document(&self) -> bool {
        self.navigate
            || self
                .accept
                .as_deref()
                .is_some_and(|accept| accept.contains("text/html"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache, fetch on miss, revalidate hits in the background.
    CacheFirst,
    /// Try the network, fall back to the cached copy.
    NetworkFirst,
    /// Network with opportunistic caching of successful responses.
    Passthrough,
    /// Not intercepted; the browser handles it.
    Ignore,
}

/// Rules for deciding which requests count as static assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRules {
    /// Lowercase, without the dot.
    pub static_extensions: Vec<String>,
    pub asset_prefixes: Vec<String>,
}

impl Default for AssetRules {
    fn default() -> Self {
        let static_extensions = ["js", "css", "png", "svg", "ico", "webp", "woff", "woff2", "webmanifest"]
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            static_extensions,
            asset_prefixes: vec!["/assets/".to_string()],
        }
    }
}

impl AssetRules {
    pub fn is_static_asset(&self, pathname: &str) -> bool {
        if pathname == MANIFEST_PATH {
            return true;
        }
        if self
            .asset_prefixes
            .iter()
            .any(|prefix| pathname.starts_with(prefix.as_str()))
        {
            return true;
        }
        let file = pathname.rsplit('/').next().unwrap_or(pathname);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.static_extensions.iter().any(|known| *known == ext)
            }
            _ => false,
        }
    }

    /// Picks the strategy for `request` when served from `app_origin`.
    pub fn classify(&self, request: &AssetRequest, app_origin: &str) -> Strategy {
        if request.method != Method::Get || request.origin != app_origin {
            return Strategy::Ignore;
        }
        if self.is_static_asset(request.pathname()) {
            Strategy::CacheFirst
        } else if request.is_document() {
            Strategy::NetworkFirst
        } else {
            Strategy::Passthrough
        }
    }
}

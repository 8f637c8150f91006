//! Offline asset caching for the web shell.
//!
//! A versioned cache is filled on install, older versions are evicted on
//! activate, and fetches are routed by [`policy::AssetRules`]: static assets
//! cache-first, documents network-first, the rest passed through.

pub mod cache;
pub mod manifest;
pub mod policy;
pub mod worker;

//! Offline-first sync kernel for the SmartCow herd manager.
//!
//! Pages read cached lists first, refresh them from the remote when online,
//! and queue writes in a durable outbox while offline. The outbox is replayed
//! in FIFO order once connectivity returns.
//!
//! # Examples
//!
//! Deriving reproductive status from an event log:
//! ```
//! use chrono::NaiveDate;
//! use smartcow_sync::repro::{
//!     event::{EventType, ReproEvent},
//!     status::{ProductiveStatus, ReproSettings, derive_status},
//! };
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
//! let events = vec![ReproEvent::new("vaca-0421", EventType::Parto, day(1))];
//! let summary = derive_status(&events, day(11), &ReproSettings::default());
//! assert_eq!(summary.days_in_milk, Some(10));
//! assert_eq!(summary.productive, ProductiveStatus::Lactating);
//! ```
//!
//! Runtime usage with a SQLite store:
//! ```no_run
//! use serde_json::json;
//! use smartcow_sync::{
//!     config::SyncConfig,
//!     persist::sqlite::SqliteStore,
//!     record::{Record, RecordDraft, RecordPatch},
//!     remote::{ListQuery, RemoteBackend, RemoteError, RemoteResult},
//!     runtime::handle::spawn_sync,
//!     types::{CacheKey, RecordId},
//! };
//!
//! struct Unreachable;
//!
//! impl RemoteBackend for Unreachable {
//!     fn fetch_list(&mut self, _: &ListQuery) -> RemoteResult<Vec<Record>> {
//!         Err(RemoteError::Offline)
//!     }
//!     fn insert(&mut self, _: &str, _: &Record) -> RemoteResult<Record> {
//!         Err(RemoteError::Offline)
//!     }
//!     fn update(&mut self, _: &str, _: RecordId, _: &RecordPatch) -> RemoteResult<()> {
//!         Err(RemoteError::Offline)
//!     }
//!     fn delete(&mut self, _: &str, _: RecordId) -> RemoteResult<()> {
//!         Err(RemoteError::Offline)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteStore::open("smartcow.db").expect("open sqlite");
//! let handle = spawn_sync(Box::new(store), Box::new(Unreachable), SyncConfig::default()).expect("spawn");
//! let key = CacheKey::new("animais", "fazenda-1");
//! let draft = RecordDraft::from_value(json!({"fazenda_id": "fazenda-1", "brinco": "0421"}));
//! let outcome = handle.create(key, "animais", draft).await.expect("create");
//! assert!(outcome.queued.is_some());
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

pub mod config;
/// Local cache, outbox queue and reconciliation primitives.
pub mod core;
/// Outbox operations and their persisted envelope.
pub mod op;
/// Storage traits with SQLite and in-memory backends.
pub mod persist;
/// Schemaless records and patches.
pub mod record;
pub mod remote;
/// Reproductive event log and status derivation.
pub mod repro;
/// Single-writer async runtime.
pub mod runtime;
/// Service-worker asset cache.
pub mod sw;
/// Shared ids, cache keys and clocks.
pub mod types;

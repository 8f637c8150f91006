use std::sync::Arc;

use chrono::NaiveDate;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::SyncConfig,
    core::{
        kv::{self, KvStore},
        memo::TtlCache,
        outbox::{FailureOutcome, Outbox},
        reconcile::{self, Advisory, PageLoadState},
    },
    op::{OutboxEntry, OutboxOp},
    persist::{LocalStore, PersistError},
    record::{Record, RecordDraft, RecordPatch},
    remote::{self, ListQuery, RemoteBackend, RemoteError, RemoteResult},
    repro::{
        event::ReproEvent,
        status::{ReproSummary, derive_status},
    },
    types::{CacheKey, Clock, OutboxSeq, RecordId, SystemClock, TENANT_COLUMN, TimestampMs},
};

use super::events::SyncEvent;

const DRAIN_LEASE: &str = "outbox-drain";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The remote refused an online write; shown inline, not retried.
    #[error("remote rejected write: {0}")]
    Rejected(RemoteError),
    #[error("record {0} is not cached")]
    MissingRecord(RecordId),
    #[error("blocking task failed: {0}")]
    Join(String),
    #[error("runtime channel closed")]
    ChannelClosed,
}

/// Result of one page load.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLoad {
    pub state: PageLoadState,
    pub items: Vec<Record>,
    pub advisory: Option<Advisory>,
    /// When the served list was last written, if it came from the cache.
    pub cache_updated_at: Option<TimestampMs>,
}

/// Result of a create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub record: Record,
    /// Set when the write went to the outbox instead of the remote.
    pub queued: Option<OutboxSeq>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    pub retry_scheduled: usize,
    pub dead_lettered: usize,
    pub remaining: usize,
    /// Another process holds the drain lease.
    pub lease_denied: bool,
}

pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl Clone for SyncHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    LoadList {
        key: CacheKey,
        query: ListQuery,
        force: bool,
        resp: oneshot::Sender<Result<PageLoad, SyncError>>,
    },
    Cached {
        key: CacheKey,
        resp: oneshot::Sender<Result<Option<Vec<Record>>, SyncError>>,
    },
    Create {
        key: CacheKey,
        table: String,
        draft: RecordDraft,
        resp: oneshot::Sender<Result<WriteOutcome, SyncError>>,
    },
    Update {
        key: CacheKey,
        table: String,
        id: RecordId,
        patch: RecordPatch,
        resp: oneshot::Sender<Result<WriteOutcome, SyncError>>,
    },
    Delete {
        key: CacheKey,
        table: String,
        id: RecordId,
        resp: oneshot::Sender<Result<Option<OutboxSeq>, SyncError>>,
    },
    SetOnline {
        online: bool,
        resp: oneshot::Sender<Result<DrainReport, SyncError>>,
    },
    Drain {
        resp: oneshot::Sender<Result<DrainReport, SyncError>>,
    },
    ReproSummary {
        key: CacheKey,
        animal_id: String,
        today: NaiveDate,
        resp: oneshot::Sender<Result<ReproSummary, SyncError>>,
    },
    Pending {
        resp: oneshot::Sender<Vec<OutboxEntry>>,
    },
    DeadLetters {
        resp: oneshot::Sender<Result<Vec<OutboxEntry>, SyncError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), SyncError>>,
    },
}

/// Spawns the runtime with the wall clock.
pub fn spawn_sync(
    store: Box<dyn LocalStore>,
    remote: Box<dyn RemoteBackend>,
    config: SyncConfig,
) -> Result<SyncHandle, SyncError> {
    spawn_sync_with_clock(store, remote, config, Arc::new(SystemClock))
}

/// Spawns the runtime; must be called inside a tokio runtime.
pub fn spawn_sync_with_clock(
    store: Box<dyn LocalStore>,
    remote: Box<dyn RemoteBackend>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
) -> Result<SyncHandle, SyncError> {
    let outbox = Outbox::load(store.as_ref(), config.retry_policy())?;
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<SyncEvent>(1024);

    info!(pending = outbox.len(), online = config.start_online, "sync runtime starting");

    let mut worker = Worker {
        store,
        remote: Arc::new(Mutex::new(remote)),
        outbox,
        memo: TtlCache::new(config.memo_ttl_ms, Arc::clone(&clock)),
        online: config.start_online,
        holder: Uuid::new_v4().to_string(),
        events_tx: events_tx.clone(),
        clock,
        config,
    };

    tokio::spawn(async move {
        let interval = Duration::from_millis(worker.config.drain_interval_ms.max(1));
        let mut deadline = Instant::now() + interval;

        loop {
            let drain_armed = worker.online && !worker.outbox.is_empty();
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if worker.handle_command(cmd).await {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline), if drain_armed => {
                    if let Err(err) = worker.drain().await {
                        warn!(error = %err, "background drain failed");
                    }
                    deadline = worker.next_drain_deadline(interval);
                }
            }
        }
    });

    Ok(SyncHandle { cmd_tx, events_tx })
}

impl SyncHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Cache first, then a remote fetch unless one ran within the memo window.
    pub async fn load_list(&self, key: CacheKey, query: ListQuery) -> Result<PageLoad, SyncError> {
        self.request(|resp| Command::LoadList {
            key,
            query,
            force: false,
            resp,
        })
        .await?
    }

    /// Like [`SyncHandle::load_list`] but always attempts the remote.
    pub async fn refresh_list(&self, key: CacheKey, query: ListQuery) -> Result<PageLoad, SyncError> {
        self.request(|resp| Command::LoadList {
            key,
            query,
            force: true,
            resp,
        })
        .await?
    }

    pub async fn cached_list(&self, key: CacheKey) -> Result<Option<Vec<Record>>, SyncError> {
        self.request(|resp| Command::Cached { key, resp }).await?
    }

    pub async fn create(
        &self,
        key: CacheKey,
        table: impl Into<String>,
        draft: RecordDraft,
    ) -> Result<WriteOutcome, SyncError> {
        let table = table.into();
        self.request(|resp| Command::Create {
            key,
            table,
            draft,
            resp,
        })
        .await?
    }

    pub async fn update(
        &self,
        key: CacheKey,
        table: impl Into<String>,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<WriteOutcome, SyncError> {
        let table = table.into();
        self.request(|resp| Command::Update {
            key,
            table,
            id,
            patch,
            resp,
        })
        .await?
    }

    pub async fn delete(
        &self,
        key: CacheKey,
        table: impl Into<String>,
        id: RecordId,
    ) -> Result<Option<OutboxSeq>, SyncError> {
        let table = table.into();
        self.request(|resp| Command::Delete {
            key,
            table,
            id,
            resp,
        })
        .await?
    }

    /// Reports connectivity; going online triggers an immediate drain.
    pub async fn set_online(&self, online: bool) -> Result<DrainReport, SyncError> {
        self.request(|resp| Command::SetOnline { online, resp }).await?
    }

    pub async fn drain_now(&self) -> Result<DrainReport, SyncError> {
        self.request(|resp| Command::Drain { resp }).await?
    }

    /// Derives an animal's status from the cached event list under `key`.
    pub async fn repro_summary(
        &self,
        key: CacheKey,
        animal_id: impl Into<String>,
        today: NaiveDate,
    ) -> Result<ReproSummary, SyncError> {
        let animal_id = animal_id.into();
        self.request(|resp| Command::ReproSummary {
            key,
            animal_id,
            today,
            resp,
        })
        .await?
    }

    pub async fn pending(&self) -> Result<Vec<OutboxEntry>, SyncError> {
        self.request(|resp| Command::Pending { resp }).await
    }

    pub async fn dead_letters(&self) -> Result<Vec<OutboxEntry>, SyncError> {
        self.request(|resp| Command::DeadLetters { resp }).await?
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }
}

struct Worker {
    store: Box<dyn LocalStore>,
    remote: SharedRemote,
    outbox: Outbox,
    memo: TtlCache<CacheKey, ()>,
    online: bool,
    holder: String,
    events_tx: broadcast::Sender<SyncEvent>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl Worker {
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::LoadList {
                key,
                query,
                force,
                resp,
            } => {
                let _ = resp.send(self.load_list(key, query, force).await);
            }
            Command::Cached { key, resp } => {
                let _ = resp.send(Ok(self.read_cached(&key).map(|(items, _)| items)));
            }
            Command::Create {
                key,
                table,
                draft,
                resp,
            } => {
                let _ = resp.send(self.create(key, table, draft).await);
            }
            Command::Update {
                key,
                table,
                id,
                patch,
                resp,
            } => {
                let _ = resp.send(self.update(key, table, id, patch).await);
            }
            Command::Delete {
                key,
                table,
                id,
                resp,
            } => {
                let _ = resp.send(self.delete(key, table, id).await);
            }
            Command::SetOnline { online, resp } => {
                self.set_online(online);
                let out = if online {
                    self.drain().await
                } else {
                    Ok(DrainReport {
                        remaining: self.outbox.len(),
                        ..DrainReport::default()
                    })
                };
                let _ = resp.send(out);
            }
            Command::Drain { resp } => {
                let _ = resp.send(self.drain().await);
            }
            Command::ReproSummary {
                key,
                animal_id,
                today,
                resp,
            } => {
                let _ = resp.send(Ok(self.repro_summary(&key, &animal_id, today)));
            }
            Command::Pending { resp } => {
                let _ = resp.send(self.outbox.entries().cloned().collect());
            }
            Command::DeadLetters { resp } => {
                let _ = resp.send(self.store.load_dead_letters().map_err(SyncError::from));
            }
            Command::Shutdown { resp } => {
                let out = self
                    .store
                    .release_lease(DRAIN_LEASE, &self.holder)
                    .map_err(SyncError::from);
                info!(pending = self.outbox.len(), "sync runtime stopping");
                let _ = resp.send(out);
                return true;
            }
        }

        false
    }

    async fn load_list(&mut self, key: CacheKey, query: ListQuery, force: bool) -> Result<PageLoad, SyncError> {
        let mut state = PageLoadState::Empty;
        advance(&mut state, PageLoadState::LoadingCache);

        let cached = self.read_cached(&key);
        advance(
            &mut state,
            if cached.is_some() {
                PageLoadState::CacheReady
            } else {
                PageLoadState::EmptyNoCache
            },
        );

        if !self.online {
            debug!(key = %key, cached = cached.is_some(), "offline; serving cache");
            return Ok(fallback(state, cached, None));
        }

        if !force && cached.is_some() && self.memo.get_fresh(&key).is_some() {
            debug!(key = %key, "memoized fetch still fresh");
            let (items, updated_at) = cached.unwrap_or_default();
            return Ok(PageLoad {
                state,
                items,
                advisory: None,
                cache_updated_at: Some(updated_at),
            });
        }

        advance(&mut state, PageLoadState::Fetching);
        let fetch_query = query.clone();
        let fetched = call_remote(Arc::clone(&self.remote), move |remote| {
            remote.fetch_list(&fetch_query)
        })
        .await?;

        match fetched {
            Ok(rows) => {
                self.outbox.reload(self.store.as_ref())?;
                let pending = self.outbox.pending_ids(&query.table);
                let local: Vec<Record> = cached
                    .map(|(items, _)| items)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|r| pending.upserts.contains(&r.id))
                    .collect();
                let mut merged = reconcile::merge_fetched_with_local(rows, &local);
                merged.retain(|r| !pending.deletes.contains(&r.id));

                self.write_cached(&key, &merged)?;
                self.memo.purge_expired();
                self.memo.insert(key.clone(), ());
                advance(&mut state, PageLoadState::Fresh);
                debug!(key = %key, items = merged.len(), unsynced = local.len(), "list refreshed");
                Ok(PageLoad {
                    state,
                    items: merged,
                    advisory: None,
                    cache_updated_at: None,
                })
            }
            Err(err) => {
                warn!(key = %key, error = %err, "remote fetch failed; serving cache");
                if err.is_connectivity() {
                    self.set_online(false);
                }
                Ok(fallback(state, cached, Some(err)))
            }
        }
    }

    async fn create(&mut self, key: CacheKey, table: String, draft: RecordDraft) -> Result<WriteOutcome, SyncError> {
        let mut record = draft.into_record();
        if record.farm_id().is_none() {
            record.set(TENANT_COLUMN, key.farm_id.clone());
        }

        self.outbox.reload(self.store.as_ref())?;
        if self.writes_go_direct() {
            let row = record.clone();
            let remote_table = table.clone();
            let inserted = call_remote(Arc::clone(&self.remote), move |remote| {
                remote.insert(&remote_table, &row)
            })
            .await?;
            match inserted {
                Ok(saved) => {
                    self.upsert_cached(&key, &saved)?;
                    return Ok(WriteOutcome {
                        record: saved,
                        queued: None,
                    });
                }
                Err(err) if err.is_connectivity() => {
                    warn!(table = %table, error = %err, "insert failed; queueing offline");
                    self.set_online(false);
                }
                Err(err) => return Err(SyncError::Rejected(err)),
            }
        }

        // A cached offline row always has its outbox entry.
        let seq = self.enqueue(OutboxOp::Insert {
            table,
            row: record.clone(),
        })?;
        self.upsert_cached(&key, &record)?;
        Ok(WriteOutcome {
            record,
            queued: Some(seq),
        })
    }

    async fn update(
        &mut self,
        key: CacheKey,
        table: String,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<WriteOutcome, SyncError> {
        let current = self
            .read_cached(&key)
            .and_then(|(items, _)| items.into_iter().find(|r| r.id == id));

        self.outbox.reload(self.store.as_ref())?;
        if self.writes_go_direct() {
            let remote_patch = patch.clone();
            let remote_table = table.clone();
            let updated = call_remote(Arc::clone(&self.remote), move |remote| {
                remote.update(&remote_table, id, &remote_patch)
            })
            .await?;
            match updated {
                Ok(()) => {
                    // Only lists that already hold the row get it back.
                    let record = match current {
                        Some(mut record) => {
                            patch.apply_to(&mut record);
                            self.upsert_cached(&key, &record)?;
                            record
                        }
                        None => patch.as_partial(id),
                    };
                    return Ok(WriteOutcome {
                        record,
                        queued: None,
                    });
                }
                Err(err) if err.is_connectivity() => {
                    warn!(table = %table, error = %err, "update failed; queueing offline");
                    self.set_online(false);
                }
                Err(err) => return Err(SyncError::Rejected(err)),
            }
        }

        let mut record = current.ok_or(SyncError::MissingRecord(id))?;
        patch.apply_to(&mut record);
        let seq = self.enqueue(OutboxOp::Update { table, id, patch })?;
        self.upsert_cached(&key, &record)?;
        Ok(WriteOutcome {
            record,
            queued: Some(seq),
        })
    }

    async fn delete(&mut self, key: CacheKey, table: String, id: RecordId) -> Result<Option<OutboxSeq>, SyncError> {
        self.outbox.reload(self.store.as_ref())?;
        if self.writes_go_direct() {
            let remote_table = table.clone();
            let deleted = call_remote(Arc::clone(&self.remote), move |remote| {
                remote.delete(&remote_table, id)
            })
            .await?;
            match deleted {
                Ok(()) | Err(RemoteError::NotFound(_)) => {
                    self.remove_cached(&key, id)?;
                    return Ok(None);
                }
                Err(err) if err.is_connectivity() => {
                    warn!(table = %table, error = %err, "delete failed; queueing offline");
                    self.set_online(false);
                }
                Err(err) => return Err(SyncError::Rejected(err)),
            }
        }

        let seq = self.enqueue(OutboxOp::Delete { table, id })?;
        self.remove_cached(&key, id)?;
        Ok(Some(seq))
    }

    /// Replays ready entries in order until the queue empties or the head fails.
    async fn drain(&mut self) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();
        if !self.online {
            report.remaining = self.outbox.len();
            return Ok(report);
        }

        if !self.renew_lease(self.clock.now_ms())? {
            debug!(holder = %self.holder, "drain lease held elsewhere");
            report.lease_denied = true;
            report.remaining = self.outbox.len();
            return Ok(report);
        }

        let replayed = self.replay_ready(&mut report).await;
        let released = self.store.release_lease(DRAIN_LEASE, &self.holder);
        replayed?;
        released?;

        if report.replayed > 0 {
            self.memo.clear();
        }
        report.remaining = self.outbox.len();
        if report.remaining == 0 && (report.replayed > 0 || report.dead_lettered > 0) {
            info!(replayed = report.replayed, dead_lettered = report.dead_lettered, "outbox drained");
            self.emit(SyncEvent::OutboxDrained);
        }
        Ok(report)
    }

    /// Body of [`Worker::drain`]; runs with the lease held.
    async fn replay_ready(&mut self, report: &mut DrainReport) -> Result<(), SyncError> {
        // Another process sharing the store may have drained or appended.
        self.outbox.reload(self.store.as_ref())?;

        loop {
            let now = self.clock.now_ms();
            let Some(entry) = self.outbox.head_ready(now).cloned() else {
                break;
            };
            // The lease must still be ours before each replay.
            if !self.renew_lease(now)? {
                warn!(seq = entry.seq, "drain lease lost; stopping");
                report.lease_denied = true;
                break;
            }

            let op = entry.op.clone();
            let result = call_remote(Arc::clone(&self.remote), move |remote| {
                remote::replay_op(remote, &op)
            })
            .await?;

            match result {
                Ok(ack) => {
                    self.outbox.ack(self.store.as_mut(), entry.seq)?;
                    debug!(seq = entry.seq, operation = entry.op.name(), ?ack, "outbox entry replayed");
                    self.emit(SyncEvent::Replayed { seq: entry.seq });
                    report.replayed += 1;
                }
                Err(RemoteError::Offline) => {
                    self.set_online(false);
                    break;
                }
                Err(RemoteError::Rejected(msg)) => {
                    warn!(seq = entry.seq, error = %msg, "remote rejected replay; dead-lettering");
                    self.outbox
                        .dead_letter_now(self.store.as_mut(), entry.seq, &msg, now)?;
                    self.emit(SyncEvent::DeadLettered {
                        seq: entry.seq,
                        error: msg,
                    });
                    report.dead_lettered += 1;
                }
                Err(err) => {
                    let msg = err.to_string();
                    match self
                        .outbox
                        .record_failure(self.store.as_mut(), entry.seq, &msg, now)?
                    {
                        FailureOutcome::Retry {
                            attempts,
                            next_attempt_at_ms,
                        } => {
                            warn!(seq = entry.seq, attempts, next_attempt_at_ms, error = %msg, "replay failed; backing off");
                            self.emit(SyncEvent::ReplayFailed {
                                seq: entry.seq,
                                attempts,
                                next_attempt_at_ms,
                            });
                            report.retry_scheduled += 1;
                            break;
                        }
                        FailureOutcome::DeadLettered { attempts } => {
                            warn!(seq = entry.seq, attempts, error = %msg, "replay attempts exhausted; dead-lettering");
                            self.emit(SyncEvent::DeadLettered {
                                seq: entry.seq,
                                error: msg,
                            });
                            report.dead_lettered += 1;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn renew_lease(&mut self, now: TimestampMs) -> Result<bool, SyncError> {
        Ok(self
            .store
            .try_acquire_lease(DRAIN_LEASE, &self.holder, now, self.config.drain_lease_ttl_ms)?)
    }

    /// Next background drain: one interval out, or later if the head is backing off.
    fn next_drain_deadline(&self, interval: Duration) -> Instant {
        let wait = self
            .outbox
            .next_due_at()
            .map_or(0, |due| due.saturating_sub(self.clock.now_ms()));
        Instant::now() + interval.max(Duration::from_millis(wait))
    }

    fn repro_summary(&self, key: &CacheKey, animal_id: &str, today: NaiveDate) -> ReproSummary {
        let rows = self.read_cached(key).map(|(items, _)| items).unwrap_or_default();
        let events: Vec<ReproEvent> = rows
            .iter()
            .filter(|r| r.get_str("animal_id") == Some(animal_id))
            .filter_map(|r| match ReproEvent::from_record(r) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(id = %r.id, error = %err, "skipping undecodable event");
                    None
                }
            })
            .collect();
        derive_status(&events, today, &self.config.repro)
    }

    // Writes queue behind older pending entries so replay order stays causal.
    fn writes_go_direct(&self) -> bool {
        self.online && self.outbox.is_empty()
    }

    fn set_online(&mut self, online: bool) {
        if self.online != online {
            info!(online, "connectivity changed");
            self.online = online;
            self.emit(SyncEvent::ConnectivityChanged { online });
        }
    }

    fn enqueue(&mut self, op: OutboxOp) -> Result<OutboxSeq, SyncError> {
        let operation = op.name();
        let now = self.clock.now_ms();
        let seq = self.outbox.enqueue(self.store.as_mut(), op, now)?;
        debug!(seq, operation, "write queued");
        self.emit(SyncEvent::Enqueued { seq, operation });
        Ok(seq)
    }

    /// Reads a cached list; an undecodable entry counts as a miss.
    fn read_cached(&self, key: &CacheKey) -> Option<(Vec<Record>, TimestampMs)> {
        match kv::read_list::<Record, _>(self.store.as_ref(), &key.storage_key()) {
            Ok(Some(envelope)) => Some((envelope.items, envelope.updated_at)),
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "cached list unreadable; treating as empty");
                None
            }
        }
    }

    fn write_cached(&mut self, key: &CacheKey, items: &[Record]) -> Result<(), SyncError> {
        let now = self.clock.now_ms();
        KvStore::new(self.store.as_mut()).store_list(&key.storage_key(), items, now)?;
        self.emit(SyncEvent::CacheUpdated { key: key.clone() });
        Ok(())
    }

    fn upsert_cached(&mut self, key: &CacheKey, record: &Record) -> Result<(), SyncError> {
        let mut items = self.read_cached(key).map(|(items, _)| items).unwrap_or_default();
        reconcile::upsert_into_list(&mut items, record);
        self.write_cached(key, &items)
    }

    fn remove_cached(&mut self, key: &CacheKey, id: RecordId) -> Result<(), SyncError> {
        let Some((mut items, _)) = self.read_cached(key) else {
            return Ok(());
        };
        if reconcile::remove_from_list(&mut items, id) {
            self.write_cached(key, &items)?;
        }
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events_tx.send(event);
    }
}

type SharedRemote = Arc<Mutex<Box<dyn RemoteBackend>>>;

async fn call_remote<T, F>(remote: SharedRemote, f: F) -> Result<RemoteResult<T>, SyncError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn RemoteBackend) -> RemoteResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = remote.blocking_lock();
        f(&mut **guard)
    })
    .await
    .map_err(|e| SyncError::Join(e.to_string()))
}

fn advance(state: &mut PageLoadState, next: PageLoadState) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    *state = next;
}

fn fallback(
    mut state: PageLoadState,
    cached: Option<(Vec<Record>, TimestampMs)>,
    err: Option<RemoteError>,
) -> PageLoad {
    advance(&mut state, PageLoadState::StaleFallbackToCache);
    let advisory = match (&cached, err) {
        (None, None | Some(RemoteError::Offline)) => Advisory::NoOfflineData,
        (Some(_), None | Some(RemoteError::Offline)) => Advisory::Offline,
        (_, Some(other)) => Advisory::RemoteUnavailable(other.to_string()),
    };
    let (items, updated_at) = match cached {
        Some((items, updated_at)) => (items, Some(updated_at)),
        None => (Vec::new(), None),
    };
    PageLoad {
        state,
        items,
        advisory: Some(advisory),
        cache_updated_at: updated_at,
    }
}

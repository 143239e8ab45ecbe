//! Queue service and reconciliation driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use roamsync_core::{ActionPayload, CacheEntry, ConnectivityMonitor, Error, LocalDb, QueuedAction, SyncStatus};

use super::{CachePolicy, SyncEvent, SyncOptions, SyncOutcome};
use crate::backend::RemoteBackend;
use crate::dispatcher::Dispatcher;
use crate::mirror::QueueMirror;

const EVENT_CAPACITY: usize = 16;

/// Marks the engine Syncing for as long as it lives.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the local log, the remote mirror and the reconciler for one user.
///
/// Construct one per process and share it behind an `Arc`.
pub struct SyncEngine {
    pub(super) db: LocalDb,
    pub(super) dispatcher: Dispatcher,
    pub(super) mirror: QueueMirror,
    pub(super) options: SyncOptions,
    connectivity: Arc<ConnectivityMonitor>,
    in_progress: AtomicBool,
    status: Mutex<SyncStatus>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        db: LocalDb, backend: Arc<dyn RemoteBackend>, connectivity: Arc<ConnectivityMonitor>,
        user_id: impl Into<String>, options: SyncOptions,
    ) -> Self {
        let user_id = user_id.into();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            dispatcher: Dispatcher::new(Arc::clone(&backend), user_id.clone()),
            mirror: QueueMirror::new(backend, user_id),
            options,
            connectivity,
            in_progress: AtomicBool::new(false),
            status: Mutex::new(SyncStatus::default()),
            events,
        }
    }

    pub fn db(&self) -> &LocalDb {
        &self.db
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn user_id(&self) -> &str {
        self.dispatcher.user_id()
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        let mut status = self.lock_status().clone();
        status.in_progress = self.in_progress.load(Ordering::Acquire);
        status
    }

    /// Recompute the pending count from the local log.
    pub async fn refresh_status(&self) -> Result<SyncStatus, Error> {
        let pending = self.db.pending_count().await?;
        self.lock_status().pending_count = pending;
        Ok(self.status())
    }

    /// Subscribe to pass notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Record a new action.
    pub async fn enqueue(&self, payload: ActionPayload) -> Result<QueuedAction, Error> {
        self.enqueue_action(QueuedAction::new(payload)).await
    }

    /// Record a pre-built action.
    ///
    /// Returns once the action is durable locally. When online, the mirror
    /// write runs in the background and never affects the result. An id that
    /// is already logged returns the logged action unchanged; re-using it
    /// with a different payload is rejected.
    pub async fn enqueue_action(&self, action: QueuedAction) -> Result<QueuedAction, Error> {
        let action = if self.db.append_action(&action).await? {
            tracing::debug!(id = %action.id, action_type = %action.action_type(), "action queued");
            if self.connectivity.is_online() {
                self.spawn_mirror_write(action.clone());
            }
            action
        } else {
            tracing::debug!(id = %action.id, "action already queued");
            match self.db.logged_action(&action.id).await? {
                Some(logged) => {
                    let existing = logged.decode()?;
                    if existing.payload != action.payload {
                        return Err(Error::InvalidInput(format!(
                            "action {} is already queued with a different payload",
                            action.id
                        )));
                    }
                    existing
                }
                None => action,
            }
        };

        if let Err(err) = self.refresh_status().await {
            tracing::warn!(error = %err, "failed to refresh pending count");
        }
        Ok(action)
    }

    fn spawn_mirror_write(&self, action: QueuedAction) {
        let mirror = self.mirror.clone();
        tokio::spawn(async move {
            match mirror.write(&action).await {
                Ok(()) => tracing::debug!(id = %action.id, "action mirrored"),
                Err(err) if err.is_relation_missing() => {}
                Err(err) => tracing::warn!(id = %action.id, error = %err, "queue mirror write failed"),
            }
        });
    }

    /// Run a reconciliation pass unless one is running or the client is offline.
    pub async fn trigger_sync(&self) -> Result<SyncOutcome, Error> {
        if !self.connectivity.is_online() {
            tracing::debug!("offline, skipping sync");
            return Ok(SyncOutcome::Offline);
        }
        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            tracing::debug!("sync already in progress");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        tracing::info!("sync pass started");
        let _ = self.events.send(SyncEvent::Started);

        let result = self.run_pass().await;

        let pending = self.db.pending_count().await;
        {
            let mut status = self.lock_status();
            if result.is_ok() {
                status.last_synced_at = Some(Utc::now());
            }
            match pending {
                Ok(count) => status.pending_count = count,
                Err(err) => tracing::warn!(error = %err, "failed to refresh pending count"),
            }
        }

        match result {
            Ok(report) => {
                tracing::info!(
                    replayed = report.replayed,
                    failed = report.failed,
                    dropped = report.dropped,
                    dead_lettered = report.dead_lettered,
                    "sync pass completed"
                );
                let _ = self.events.send(SyncEvent::Completed(report.clone()));
                Ok(SyncOutcome::Completed(report))
            }
            Err(err) => {
                tracing::error!(error = %err, "sync pass aborted, local log preserved");
                let _ = self.events.send(SyncEvent::Failed { reason: err.to_string() });
                Err(err)
            }
        }
    }

    /// Run a pass and log its failure instead of returning it.
    async fn sync_in_background(&self) {
        if let Err(err) = self.trigger_sync().await {
            tracing::debug!(error = %err, "background sync failed");
        }
    }

    /// Trigger a pass on every transition to online.
    ///
    /// The listener holds a weak reference and stops once the engine is dropped.
    pub fn spawn_connectivity_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        self.connectivity.on_became_online(move || {
            let engine = engine.clone();
            async move {
                if let Some(engine) = engine.upgrade() {
                    engine.sync_in_background().await;
                }
            }
        })
    }

    /// Start the connectivity listener and, when already online, an initial pass.
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let listener = self.spawn_connectivity_listener();
        if let Err(err) = self.refresh_status().await {
            tracing::warn!(error = %err, "failed to read pending count at startup");
        }
        if self.connectivity.is_online() {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.sync_in_background().await });
        }
        listener
    }

    /// Periodically delete expired cache entries.
    pub fn spawn_cache_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else { break };
                match engine.db.cleanup_expired_cache().await {
                    Ok(removed) => tracing::debug!(removed, "expired cache entries swept"),
                    Err(err) => tracing::warn!(error = %err, "cache sweep failed"),
                }
            }
        })
    }

    /// Write a cache entry with an explicit TTL.
    pub async fn cache_write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<CacheEntry, Error> {
        self.db.set_cache(key, value, ttl).await
    }

    /// Write a cache entry with the TTL of a reference policy.
    pub async fn cache_write_with_policy<T: Serialize>(
        &self, key: &str, value: &T, policy: CachePolicy,
    ) -> Result<CacheEntry, Error> {
        self.cache_write(key, value, self.ttl_for(policy)).await
    }

    pub fn ttl_for(&self, policy: CachePolicy) -> Duration {
        match policy {
            CachePolicy::Catalog => self.options.catalog_ttl,
            CachePolicy::Progress => self.options.progress_ttl,
        }
    }

    /// Read a live cache entry; expired entries read as absent and are evicted.
    pub async fn cache_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.db.get_cache(key).await
    }

    /// Delete expired cache entries now.
    pub async fn cleanup_expired_cache(&self) -> Result<u64, Error> {
        self.db.cleanup_expired_cache().await
    }

    /// Wipe every local store, the cache and the queue, then reset the pending count.
    pub async fn clear_all_local_data(&self) -> Result<(), Error> {
        self.db.clear_all_local_data().await?;
        self.lock_status().pending_count = 0;
        tracing::info!("local data cleared");
        Ok(())
    }
}

//! Storage mode manager
//!
//! Owns the single "current storage" reference and keeps it pointed
//! at the best available backend: the remote persistence engine when
//! its health probe answers, the local fallback store otherwise.
//! Fixed-period probing, no backoff; one failed probe fails over, one
//! successful probe fails back. Data written locally while the remote
//! is down is NOT migrated back on recovery; reconciliation is a
//! separate manual concern.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{LocalStore, PostStore, RemoteStore};

/// Which backend is currently authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Remote,
    Local,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Snapshot of the manager's state for dependents and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageModeInfo {
    pub mode: StorageMode,
    pub connected: bool,
    pub initialized: bool,
}

pub struct StorageManager {
    remote: Arc<RemoteStore>,
    local: Arc<LocalStore>,
    mode: RwLock<StorageMode>,
    changes: watch::Sender<StorageMode>,
    initialized: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl StorageManager {
    /// Create a manager over the two backends
    ///
    /// Starts in local mode until [`initialize`](Self::initialize)
    /// has probed the remote.
    pub fn new(remote: RemoteStore, local: LocalStore) -> Self {
        let (changes, _) = watch::channel(StorageMode::Local);

        Self {
            remote: Arc::new(remote),
            local: Arc::new(local),
            mode: RwLock::new(StorageMode::Local),
            changes,
            initialized: AtomicBool::new(false),
            monitor: Mutex::new(None),
        }
    }

    /// Probe the remote once and pick the initial backend
    ///
    /// Always finishes initialized, even when only the (possibly
    /// degraded) local store is usable, so dependents polling for
    /// readiness never wait forever.
    pub async fn initialize(&self) {
        tracing::info!("Initializing storage manager...");

        let mode = if self.remote.probe().await {
            StorageMode::Remote
        } else {
            StorageMode::Local
        };

        self.switch_to(mode);
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(%mode, "Storage manager initialized");
    }

    /// The active backend
    ///
    /// Callers must not cache the returned reference across calls
    /// that could span a failover: an operation already running keeps
    /// its store, the next `current_store()` reflects the switch.
    pub fn current_store(&self) -> Arc<dyn PostStore> {
        match self.mode() {
            StorageMode::Remote => self.remote.clone(),
            StorageMode::Local => self.local.clone(),
        }
    }

    pub fn mode(&self) -> StorageMode {
        *self.mode.read().expect("mode lock poisoned")
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn storage_mode_info(&self) -> StorageModeInfo {
        let mode = self.mode();
        StorageModeInfo {
            mode,
            connected: mode == StorageMode::Remote,
            initialized: self.is_initialized(),
        }
    }

    /// Subscribe to store-changed notifications
    ///
    /// Exactly one value is published per transition, before the
    /// transition call returns. Dependents should drop any cached
    /// listings/stats and reload from the new current store.
    pub fn subscribe(&self) -> watch::Receiver<StorageMode> {
        self.changes.subscribe()
    }

    /// Start the periodic connection monitor
    ///
    /// Idempotent: calling while already running is a no-op. A single
    /// task re-arms on a fixed period, so at most one probe is in
    /// flight at a time.
    pub fn start_monitor(self: &Arc<Self>, interval: Duration) {
        let mut monitor = self.monitor.lock().expect("monitor lock poisoned");

        if monitor.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick; initialize() already probed.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                manager.tick().await;
            }
        });

        *monitor = Some(handle);
        tracing::info!(interval_secs = interval.as_secs(), "Connection monitor started");
    }

    /// Stop the periodic monitor; safe to call when not running
    ///
    /// Cancels future ticks only. A probe already in flight finishes
    /// on its own.
    pub fn stop_monitor(&self) {
        let mut monitor = self.monitor.lock().expect("monitor lock poisoned");
        if let Some(task) = monitor.take() {
            task.abort();
            tracing::info!("Connection monitor stopped");
        }
    }

    /// Forced one-shot probe, same semantics as one periodic tick
    ///
    /// For explicit "reconnect" user actions; callable any time
    /// regardless of the monitor schedule. Returns the mode that is
    /// active afterwards.
    pub async fn retry_now(&self) -> StorageMode {
        self.tick().await;
        self.mode()
    }

    /// One probe cycle
    ///
    /// Remote mode: a failed probe fails over to local.
    /// Local mode: a successful probe fails back to remote.
    /// Probe failures are logged, never raised; the switch itself is
    /// the recovery action.
    async fn tick(&self) {
        match self.mode() {
            StorageMode::Remote => {
                if !self.remote.probe().await {
                    tracing::warn!("Remote backend unreachable; failing over to local storage");
                    self.switch_to(StorageMode::Local);
                }
            }
            StorageMode::Local => {
                if self.remote.probe().await {
                    tracing::info!("Remote backend recovered; switching back to remote storage");
                    self.switch_to(StorageMode::Remote);
                }
            }
        }
    }

    /// Swap the current store and publish the change
    ///
    /// The notification is sent before this returns, so no dependent
    /// can observe a half-applied transition. Locally written data is
    /// left where it is on fail-back.
    fn switch_to(&self, mode: StorageMode) {
        {
            let mut current = self.mode.write().expect("mode lock poisoned");
            if *current == mode {
                return;
            }
            *current = mode;
        }

        self.changes.send_replace(mode);
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        if let Ok(mut monitor) = self.monitor.lock() {
            if let Some(task) = monitor.take() {
                task.abort();
            }
        }
    }
}

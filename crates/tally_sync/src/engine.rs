//! Sync engine orchestration
//!
//! Wires the local store, connectivity monitor, reconciler and session
//! cache together. Every confirmed offline-to-online transition drains the
//! queues of all identities, and queues left behind by a failed write while
//! online are retried on every recheck interval.

use crate::{
    client::RatingClient,
    config::SyncConfig,
    connectivity::{Connectivity, ConnectivityMonitor, HttpProbe, MonitorHandle, Probe, Signal},
    queue::MutationQueue,
    reconciler::{SyncReconciler, SyncReport},
    remote::{HttpRemote, Remote},
    session::SessionCache,
    store::LocalStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Main sync engine
pub struct SyncEngine {
    store: LocalStore,
    remote: Arc<dyn Remote>,
    monitor: ConnectivityMonitor,
    reconciler: Arc<SyncReconciler>,
    session: SessionCache,
    retry_interval: Duration,
    running: Option<MonitorHandle>,
    watcher: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Create an engine talking HTTP to `config.base_url`
    pub fn new(config: SyncConfig) -> crate::Result<Self> {
        config.validate()?;

        let store = LocalStore::open(&config.store_path);
        let remote = Arc::new(HttpRemote::new(&config.base_url, config.request_timeout)?);
        let probe = Arc::new(HttpProbe::new(config.healthcheck_url(), config.probe_timeout));

        Ok(Self::with_parts(&config, store, remote, probe))
    }

    /// Create an engine over caller-supplied boundary and probe
    pub fn with_parts(
        config: &SyncConfig,
        store: LocalStore,
        remote: Arc<dyn Remote>,
        probe: Arc<dyn Probe>,
    ) -> Self {
        let monitor = ConnectivityMonitor::new(
            probe,
            store.clone(),
            config.debounce,
            config.recheck_interval,
        );
        let reconciler = Arc::new(SyncReconciler::new(
            remote.clone(),
            MutationQueue::new(store.clone()),
        ));
        let session = SessionCache::new(store.clone(), config.session_ttl_days);

        Self {
            store,
            remote,
            monitor,
            reconciler,
            session,
            retry_interval: config.recheck_interval,
            running: None,
            watcher: None,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn connectivity(&self) -> Connectivity {
        self.monitor.connectivity()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn queue(&self) -> MutationQueue {
        MutationQueue::new(self.store.clone())
    }

    pub fn client(&self) -> RatingClient {
        RatingClient::new(self.remote.clone(), self.store.clone(), self.connectivity())
    }

    /// One immediate reachability check, persisted like any other
    pub async fn check_now(&self) -> bool {
        self.monitor.verify_now().await
    }

    pub async fn drain(&self, owner: &str) -> SyncReport {
        self.reconciler.drain_and_sync(owner).await
    }

    pub async fn drain_all(&self) -> Vec<(String, SyncReport)> {
        self.reconciler.drain_all().await
    }

    /// Start monitoring and replay queues on every return to online
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let mut rx = self.monitor.connectivity().subscribe();
        let mut was_online = *rx.borrow_and_update();
        let reconciler = self.reconciler.clone();
        let queue = self.queue();
        let retry = self.retry_interval;
        self.watcher = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + retry, retry);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *rx.borrow_and_update();
                        if online && !was_online {
                            tracing::info!("Back online, replaying queued writes");
                            reconciler.drain_all().await;
                        }
                        was_online = online;
                    }
                    _ = ticker.tick() => {
                        // Writes that failed while online never see a transition
                        if *rx.borrow() && !queue.owners().is_empty() {
                            tracing::debug!("Retrying queued writes");
                            reconciler.drain_all().await;
                        }
                    }
                }
            }
        }));

        self.running = Some(self.monitor.start());
        tracing::info!("Sync engine started");
    }

    /// Forward a platform connectivity hint
    pub fn notify(&self, signal: Signal) {
        match &self.running {
            Some(handle) => handle.notify(signal),
            None => tracing::debug!("Ignoring {:?}, engine not started", signal),
        }
    }

    /// Stop monitoring and flush local state
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.running.take() {
            handle.stop().await;
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Err(e) = self.store.flush() {
            tracing::error!("Failed to flush local state: {}", e);
        }
        tracing::info!("Sync engine stopped");
    }
}

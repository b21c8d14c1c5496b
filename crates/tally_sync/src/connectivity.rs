//! Connectivity monitoring
//!
//! Platform online/offline signals are only hints. Each one restarts a
//! quiet period; when it elapses a reachability probe decides the real
//! state. The confirmed state is persisted under `connectionState` and
//! published on a `watch` channel so subscribers see every transition.
//! A periodic re-verification runs independently of signals.

use crate::store::{keys, LocalStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Platform connectivity hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Online,
    Offline,
}

/// Reachability check against the persistence boundary
#[async_trait]
pub trait Probe: Send + Sync {
    /// True only when the boundary answered with a success status
    async fn check(&self) -> bool;
}

/// `HEAD <base>/healthcheck` with its own timeout
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> bool {
        match self
            .client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!("Healthcheck answered {}", response.status());
                response.status().is_success()
            }
            Err(e) => {
                tracing::debug!("Healthcheck failed: {}", e);
                false
            }
        }
    }
}

/// Cancel-and-reschedule timer
///
/// Scheduling again before the deadline pushes it back, so only the last
/// of a burst of triggers fires.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves at the deadline, or never when nothing is scheduled
    ///
    /// Cancel-safe: dropping the future leaves the deadline in place.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// Read side of the confirmed connectivity state
#[derive(Debug, Clone)]
pub struct Connectivity {
    rx: watch::Receiver<bool>,
}

impl Connectivity {
    /// A state nobody will ever change
    pub fn fixed(online: bool) -> Self {
        let (_tx, rx) = watch::channel(online);
        Self { rx }
    }

    /// A state driven by hand through the returned sender
    pub fn manual(online: bool) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(online);
        (tx, Self { rx })
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

struct MonitorShared {
    probe: Arc<dyn Probe>,
    store: LocalStore,
    state: watch::Sender<bool>,
}

impl MonitorShared {
    async fn verify(&self) -> bool {
        let online = self.probe.check().await;
        self.store.set(keys::CONNECTION_STATE, &online.to_string());

        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        online
    }
}

/// Owns the confirmed connectivity state
#[derive(Clone)]
pub struct ConnectivityMonitor {
    shared: Arc<MonitorShared>,
    debounce: Duration,
    recheck_interval: Duration,
}

impl ConnectivityMonitor {
    /// Start from the persisted state; offline when nothing was persisted
    pub fn new(
        probe: Arc<dyn Probe>,
        store: LocalStore,
        debounce: Duration,
        recheck_interval: Duration,
    ) -> Self {
        let initial = store
            .get::<String>(keys::CONNECTION_STATE)
            .is_some_and(|s| s == "true");
        let (state, _rx) = watch::channel(initial);

        Self {
            shared: Arc::new(MonitorShared {
                probe,
                store,
                state,
            }),
            debounce,
            recheck_interval,
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        Connectivity {
            rx: self.shared.state.subscribe(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.shared.state.borrow()
    }

    /// Probe right away, bypassing the quiet period
    pub async fn verify_now(&self) -> bool {
        self.shared.verify().await
    }

    /// Spawn the monitoring loop; an initial check runs after one quiet period
    pub fn start(&self) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(
            self.shared.clone(),
            rx,
            self.debounce,
            self.recheck_interval,
        ));

        MonitorHandle {
            commands: tx,
            task,
            connectivity: self.connectivity(),
        }
    }
}

enum Command {
    Signal(Signal),
    Stop,
}

async fn run(
    shared: Arc<MonitorShared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    debounce: Duration,
    recheck_interval: Duration,
) {
    let mut debouncer = Debouncer::new(debounce);
    debouncer.schedule();

    let mut ticker = tokio::time::interval_at(Instant::now() + recheck_interval, recheck_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Signal(signal)) => {
                    tracing::debug!("Platform reported {:?}, re-verifying after quiet period", signal);
                    debouncer.schedule();
                }
                Some(Command::Stop) | None => break,
            },
            _ = debouncer.fired() => {
                shared.verify().await;
            }
            _ = ticker.tick() => {
                // A scheduled check is about to run anyway
                if !debouncer.is_pending() {
                    shared.verify().await;
                }
            }
        }
    }

    tracing::debug!("Connectivity monitor stopped");
}

/// Running monitor
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
    connectivity: Connectivity,
}

impl MonitorHandle {
    /// Feed a platform hint into the monitor
    pub fn notify(&self, signal: Signal) {
        if self.commands.send(Command::Signal(signal)).is_err() {
            tracing::debug!("Connectivity monitor already stopped");
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.clone()
    }

    /// Stop the loop; pending timers are discarded
    pub async fn stop(self) {
        let _ = self.commands.send(Command::Stop);
        if let Err(e) = self.task.await {
            tracing::warn!("Connectivity monitor ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_fires_once_after_last_schedule() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        let start = Instant::now();

        debouncer.schedule();
        tokio::time::advance(Duration::from_secs(1)).await;
        debouncer.schedule();

        debouncer.fired().await;
        assert_eq!(Instant::now() - start, Duration::from_secs(3));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_debouncer_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.schedule();
        debouncer.cancel();

        let fired = tokio::time::timeout(Duration::from_secs(60), debouncer.fired()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn test_fixed_connectivity_keeps_value() {
        assert!(Connectivity::fixed(true).is_online());
        assert!(!Connectivity::fixed(false).is_online());
    }
}

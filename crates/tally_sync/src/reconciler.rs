//! Replays queued writes once the boundary is reachable again

use crate::queue::{Mutation, MutationQueue};
use crate::remote::Remote;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tally_common::sanitizer::redact;
use tokio::sync::Mutex;

/// Outcome of draining one identity's queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub replayed: usize,
    pub remaining: usize,
    /// Error that stopped the drain, if any
    pub failed: Option<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_none() && self.remaining == 0
    }
}

pub struct SyncReconciler {
    remote: Arc<dyn Remote>,
    queue: MutationQueue,
    drain_lock: Mutex<()>,
}

impl SyncReconciler {
    pub fn new(remote: Arc<dyn Remote>, queue: MutationQueue) -> Self {
        Self {
            remote,
            queue,
            drain_lock: Mutex::new(()),
        }
    }

    /// Replay `owner`'s unsynced writes in order
    ///
    /// Each success removes exactly that entry; the first failure stops the
    /// drain and leaves the failed entry and everything after it queued.
    /// Concurrent drains run one after another, and the queue is re-read
    /// before each replay so entries added meanwhile are picked up.
    pub async fn drain_and_sync(&self, owner: &str) -> SyncReport {
        let _guard = self.drain_lock.lock().await;
        let mut report = SyncReport::default();

        while let Some(entry) = self.queue.next_pending(owner) {
            match replay(self.remote.as_ref(), &entry.mutation).await {
                Ok(()) => {
                    tracing::debug!("Replayed {} for {}", entry.mutation.describe(), redact(owner));
                    report.replayed += 1;
                    if !self.queue.remove(owner, &entry) {
                        tracing::warn!(
                            "Queued entry {} for {} vanished during replay",
                            entry.id,
                            redact(owner)
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Replay of {} for {} failed, keeping it queued: {}",
                        entry.mutation.describe(),
                        redact(owner),
                        e
                    );
                    report.failed = Some(e.to_string());
                    break;
                }
            }
        }

        report.remaining = self.queue.len(owner);
        if report.replayed > 0 || report.failed.is_some() {
            tracing::info!(
                "Sync for {}: {} replayed, {} remaining",
                redact(owner),
                report.replayed,
                report.remaining
            );
        }
        report
    }

    /// Drain every identity that has a queue
    pub async fn drain_all(&self) -> Vec<(String, SyncReport)> {
        let mut reports = Vec::new();
        for owner in self.queue.owners() {
            let report = self.drain_and_sync(&owner).await;
            reports.push((owner, report));
        }
        reports
    }
}

async fn replay(remote: &dyn Remote, mutation: &Mutation) -> Result<()> {
    match mutation {
        Mutation::SubmitRating(rating) => remote.create_rating(rating).await.map(|_| ()),
        Mutation::UpdateProfileName { email, name } => {
            remote.save_profile(email, name).await.map(|_| ())
        }
    }
}

//! Connectivity-aware facade used by the UI layer
//!
//! User writes (ratings, profile names) go straight to the boundary when
//! online and fall back to the mutation queue otherwise. Reads and
//! administrative writes need a connection.

use crate::connectivity::Connectivity;
use crate::queue::{Mutation, MutationQueue, PendingMutation};
use crate::remote::Remote;
use crate::store::{keys, LocalStore};
use crate::{Result, SyncError};
use serde::Serialize;
use std::sync::Arc;
use tally_common::sanitizer::redact;
use tally_common::{
    validation, DailyCompletion, Identity, NewRating, Rating, Score, UserProfile,
};
use tally_core::{mark_complaint, CompletionPlan};

/// Why a write was queued instead of sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueReason {
    Offline,
    RemoteFailed,
    /// Earlier writes for the same identity are still queued
    Backlog,
}

/// Outcome of a user write
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    Sent(T),
    Queued {
        entry: PendingMutation,
        reason: QueueReason,
    },
}

impl<T> Submission<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued { .. })
    }

    /// User-facing status line
    pub fn message(&self) -> &'static str {
        match self {
            Submission::Sent(_) => "Saved.",
            Submission::Queued {
                reason: QueueReason::Offline,
                ..
            } => "Saved locally. Will sync when back online.",
            Submission::Queued {
                reason: QueueReason::RemoteFailed,
                ..
            } => "Saved locally. Will retry when connection improves.",
            Submission::Queued {
                reason: QueueReason::Backlog,
                ..
            } => "Saved locally behind earlier unsynced writes. Will sync in order.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    Remote,
    Cache,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub profile: UserProfile,
    pub source: ProfileSource,
    /// A queued name change not yet confirmed by the boundary
    pub pending_name: bool,
    pub needs_full_name: bool,
}

/// Result of writing one completion decision
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReport {
    pub penalties_written: usize,
    pub penalties_failed: usize,
    pub record: Option<DailyCompletion>,
    pub record_error: Option<String>,
}

impl DecisionReport {
    pub fn is_complete(&self) -> bool {
        self.penalties_failed == 0 && self.record.is_some()
    }
}

#[derive(Clone)]
pub struct RatingClient {
    remote: Arc<dyn Remote>,
    queue: MutationQueue,
    store: LocalStore,
    connectivity: Connectivity,
}

impl RatingClient {
    pub fn new(
        remote: Arc<dyn Remote>,
        store: LocalStore,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            remote,
            queue: MutationQueue::new(store.clone()),
            store,
            connectivity,
        }
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    fn require_online(&self, action: &'static str) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline(action))
        }
    }

    /// Validate and send a rating, queueing it when the boundary is out of reach
    ///
    /// Validation failures are returned before anything is written. A rating
    /// never overtakes queued writes of the same identity.
    pub async fn submit_rating(
        &self,
        who: &Identity,
        customer_number: &str,
        score: Score,
    ) -> Result<Submission<Rating>> {
        let customer_number = validation::customer_number(customer_number)?;
        let rating = NewRating {
            name: self.submitter_name(who),
            email: who.email.clone(),
            customer_number,
            score,
        };

        let blocked = if !self.is_online() {
            Some(QueueReason::Offline)
        } else if !self.queue.is_empty(&who.email) {
            Some(QueueReason::Backlog)
        } else {
            None
        };
        if let Some(reason) = blocked {
            let entry = self.queue.enqueue(&who.email, Mutation::SubmitRating(rating));
            return Ok(Submission::Queued { entry, reason });
        }

        match self.remote.create_rating(&rating).await {
            Ok(saved) => {
                tracing::info!("Rating {} submitted for customer {}", saved.id, saved.customer_number);
                Ok(Submission::Sent(saved))
            }
            Err(e) => {
                tracing::warn!("Rating submission failed, queueing: {}", e);
                let entry = self.queue.enqueue(&who.email, Mutation::SubmitRating(rating));
                Ok(Submission::Queued {
                    entry,
                    reason: QueueReason::RemoteFailed,
                })
            }
        }
    }

    fn submitter_name(&self, who: &Identity) -> String {
        self.cached_profile(&who.email)
            .and_then(|p| p.name)
            .unwrap_or_else(|| who.display_name().to_string())
    }

    fn cached_profile(&self, email: &str) -> Option<UserProfile> {
        self.store.get(&keys::profile(email))
    }

    fn cache_profile(&self, profile: &UserProfile) {
        self.store.set(&keys::profile(&profile.email), profile);
    }

    /// Change the display name; the local cache reflects it immediately
    pub async fn save_profile_name(
        &self,
        who: &Identity,
        name: &str,
    ) -> Result<Submission<UserProfile>> {
        let name = validation::full_name(name)?;

        let mut local = self.cached_profile(&who.email).unwrap_or(UserProfile {
            id: None,
            email: who.email.clone(),
            name: None,
        });
        local.name = Some(name.clone());
        self.cache_profile(&local);

        let mutation = Mutation::UpdateProfileName {
            email: who.email.clone(),
            name: name.clone(),
        };

        if !self.is_online() {
            let entry = self.queue.enqueue(&who.email, mutation);
            return Ok(Submission::Queued {
                entry,
                reason: QueueReason::Offline,
            });
        }

        match self.remote.save_profile(&who.email, &name).await {
            Ok(saved) => {
                self.cache_profile(&saved);
                Ok(Submission::Sent(saved))
            }
            Err(e) => {
                tracing::warn!("Profile update failed, queueing: {}", e);
                let entry = self.queue.enqueue(&who.email, mutation);
                Ok(Submission::Queued {
                    entry,
                    reason: QueueReason::RemoteFailed,
                })
            }
        }
    }

    /// The profile from the boundary, falling back to the local cache
    ///
    /// A queued name change overrides whatever name was loaded.
    pub async fn load_profile(&self, who: &Identity) -> ProfileView {
        let cached = || {
            self.cached_profile(&who.email)
                .map(|p| (p, ProfileSource::Cache))
        };

        let loaded = if self.is_online() {
            match self.remote.get_profile(&who.email).await {
                Ok(Some(profile)) => {
                    self.cache_profile(&profile);
                    Some((profile, ProfileSource::Remote))
                }
                Ok(None) => Some((
                    UserProfile {
                        id: None,
                        email: who.email.clone(),
                        name: None,
                    },
                    ProfileSource::Remote,
                )),
                Err(e) => {
                    tracing::warn!("Profile fetch failed, using cached copy: {}", e);
                    cached()
                }
            }
        } else {
            cached()
        };

        let (mut profile, source) = loaded.unwrap_or_else(|| {
            (
                UserProfile {
                    id: None,
                    email: who.email.clone(),
                    name: None,
                },
                ProfileSource::Empty,
            )
        });

        let queued_name = self
            .queue
            .pending(&who.email)
            .into_iter()
            .filter_map(|p| match p.mutation {
                Mutation::UpdateProfileName { name, .. } => Some(name),
                Mutation::SubmitRating(_) => None,
            })
            .last();

        let pending_name = queued_name.is_some();
        if let Some(name) = queued_name {
            profile.name = Some(name);
        }

        ProfileView {
            needs_full_name: profile.needs_full_name(),
            profile,
            source,
            pending_name,
        }
    }

    pub async fn ratings(&self, email: Option<&str>) -> Result<Vec<Rating>> {
        self.require_online("loading ratings")?;
        self.remote.list_ratings(email).await
    }

    pub async fn completions(&self) -> Result<Vec<DailyCompletion>> {
        self.require_online("loading daily completions")?;
        self.remote.list_completions().await
    }

    /// Rewrite a rating as a complaint: reference suffixed, score forced to -2
    pub async fn mark_complaint(&self, rating: &Rating) -> Result<Rating> {
        self.require_online("marking a complaint")?;
        let body = mark_complaint(rating);
        let updated = self.remote.update_rating(rating.id, &body).await?;
        tracing::info!("Rating {} marked as complaint", rating.id);
        Ok(updated)
    }

    pub async fn delete_rating(&self, id: i64) -> Result<()> {
        self.require_online("deleting a rating")?;
        self.remote.delete_rating(id).await?;
        tracing::info!("Rating {} deleted", id);
        Ok(())
    }

    /// Write a decision's penalties one by one, then the completion record
    ///
    /// A failed penalty is logged and the rest still go out; nothing already
    /// written is rolled back.
    pub async fn record_decision(&self, plan: &CompletionPlan) -> Result<DecisionReport> {
        self.require_online("recording a completion decision")?;
        let mut report = DecisionReport::default();

        for (i, penalty) in plan.penalties.iter().enumerate() {
            match self.remote.create_rating(penalty).await {
                Ok(_) => report.penalties_written += 1,
                Err(e) => {
                    tracing::error!(
                        "Penalty {}/{} for {} on {} failed: {}",
                        i + 1,
                        plan.penalties.len(),
                        redact(&plan.email),
                        plan.day,
                        e
                    );
                    report.penalties_failed += 1;
                }
            }
        }

        match self.remote.create_completion(&plan.record).await {
            Ok(record) => report.record = Some(record),
            Err(e) => {
                tracing::error!(
                    "Completion record for {} on {} failed: {}",
                    redact(&plan.email),
                    plan.day,
                    e
                );
                report.record_error = Some(e.to_string());
            }
        }

        Ok(report)
    }
}

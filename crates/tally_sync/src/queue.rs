//! Per-identity queue of writes made while offline
//!
//! Entries live in the local store under `pending_<email>` in the order
//! they were made. Enqueueing never fails and never drops an entry.

use crate::store::{keys, LocalStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_common::sanitizer::redact;
use tally_common::NewRating;

/// A deferred write to the persistence boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    SubmitRating(NewRating),
    UpdateProfileName { email: String, name: String },
}

impl Mutation {
    pub fn describe(&self) -> String {
        match self {
            Mutation::SubmitRating(r) => {
                format!("rating {} for customer {}", r.score, r.customer_number)
            }
            Mutation::UpdateProfileName { name, .. } => format!("profile name '{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub id: u64,
    pub mutation: Mutation,
    /// Entries already marked synced are skipped on replay
    #[serde(default)]
    pub synced: bool,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MutationQueue {
    store: LocalStore,
}

impl MutationQueue {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Append a write for `owner`
    pub fn enqueue(&self, owner: &str, mutation: Mutation) -> PendingMutation {
        let key = keys::pending(owner);
        let entry = self.store.update::<Vec<PendingMutation>, _>(&key, |slot| {
            let list = slot.get_or_insert_with(Vec::new);
            let id = list.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let entry = PendingMutation {
                id,
                mutation,
                synced: false,
                queued_at: Utc::now(),
            };
            list.push(entry.clone());
            entry
        });

        tracing::info!("Queued {} for {}", entry.mutation.describe(), redact(owner));
        entry
    }

    /// Unsynced entries in insertion order
    pub fn pending(&self, owner: &str) -> Vec<PendingMutation> {
        self.store
            .get::<Vec<PendingMutation>>(&keys::pending(owner))
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.synced)
            .collect()
    }

    pub fn next_pending(&self, owner: &str) -> Option<PendingMutation> {
        self.pending(owner).into_iter().next()
    }

    pub fn len(&self, owner: &str) -> usize {
        self.pending(owner).len()
    }

    pub fn is_empty(&self, owner: &str) -> bool {
        self.len(owner) == 0
    }

    /// Identities with a queue present
    pub fn owners(&self) -> Vec<String> {
        self.store
            .keys_with_prefix(keys::pending_prefix())
            .iter()
            .filter_map(|k| keys::pending_owner(k))
            .map(str::to_string)
            .collect()
    }

    /// Drop one replayed entry; the key goes away once nothing is left unsynced
    pub fn remove(&self, owner: &str, entry: &PendingMutation) -> bool {
        self.store
            .update::<Vec<PendingMutation>, _>(&keys::pending(owner), |slot| {
                let Some(list) = slot.as_mut() else {
                    return false;
                };
                let Some(pos) = list.iter().position(|p| p == entry) else {
                    return false;
                };
                list.remove(pos);
                if list.iter().all(|p| p.synced) {
                    *slot = None;
                }
                true
            })
    }

    pub fn clear(&self, owner: &str) {
        self.store.remove(&keys::pending(owner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::Score;

    fn submit(customer: &str) -> Mutation {
        Mutation::SubmitRating(NewRating {
            name: "Ann Lee".to_string(),
            email: "a@x.com".to_string(),
            customer_number: customer.to_string(),
            score: Score::Good,
        })
    }

    #[test]
    fn test_fifo_order_and_ids() {
        let queue = MutationQueue::new(LocalStore::in_memory());
        queue.enqueue("a@x.com", submit("1"));
        queue.enqueue("a@x.com", submit("2"));
        queue.enqueue("b@x.com", submit("3"));

        let pending = queue.pending("a@x.com");
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, 1);
        assert_eq!(pending[1].id, 2);
        assert_eq!(pending[1].mutation, submit("2"));

        let mut owners = queue.owners();
        owners.sort();
        assert_eq!(owners, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_remove_last_entry_clears_key() {
        let store = LocalStore::in_memory();
        let queue = MutationQueue::new(store.clone());
        let entry = queue.enqueue("a@x.com", submit("1"));

        assert!(queue.remove("a@x.com", &entry));
        assert!(!store.contains("pending_a@x.com"));
        assert!(!queue.remove("a@x.com", &entry));
    }

    #[test]
    fn test_synced_entries_are_skipped() {
        let store = LocalStore::in_memory();
        let queue = MutationQueue::new(store.clone());
        queue.enqueue("a@x.com", submit("1"));
        let second = queue.enqueue("a@x.com", submit("2"));

        store.update::<Vec<PendingMutation>, _>("pending_a@x.com", |slot| {
            if let Some(list) = slot.as_mut() {
                list[0].synced = true;
            }
        });

        assert_eq!(queue.next_pending("a@x.com"), Some(second.clone()));
        assert!(queue.remove("a@x.com", &second));
        assert!(!store.contains("pending_a@x.com"));
    }

    #[test]
    fn test_entry_wire_shape() {
        let queue = MutationQueue::new(LocalStore::in_memory());
        let entry = queue.enqueue(
            "a@x.com",
            Mutation::UpdateProfileName {
                email: "a@x.com".to_string(),
                name: "Ann Lee".to_string(),
            },
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["mutation"]["kind"], "update_profile_name");
        assert_eq!(json["mutation"]["name"], "Ann Lee");
        assert_eq!(json["synced"], false);
        assert!(json.get("queuedAt").is_some());
    }
}

mod common;

use common::FakeRemote;
use std::sync::Arc;
use tally_common::{NewRating, Score};
use tally_sync::{LocalStore, Mutation, MutationQueue, SyncReconciler};

fn submit(customer: &str) -> Mutation {
    Mutation::SubmitRating(NewRating {
        name: "Ann Lee".to_string(),
        email: "ann@x.com".to_string(),
        customer_number: customer.to_string(),
        score: Score::Good,
    })
}

fn setup() -> (Arc<FakeRemote>, MutationQueue, SyncReconciler) {
    let remote = FakeRemote::new();
    let queue = MutationQueue::new(LocalStore::in_memory());
    let reconciler = SyncReconciler::new(remote.clone(), queue.clone());
    (remote, queue, reconciler)
}

#[tokio::test]
async fn test_queued_writes_replay_in_order() {
    let (remote, queue, reconciler) = setup();
    for c in ["1", "2", "3"] {
        queue.enqueue("ann@x.com", submit(c));
    }

    let report = reconciler.drain_and_sync("ann@x.com").await;

    assert!(report.is_clean());
    assert_eq!(report.replayed, 3);
    assert_eq!(remote.customers(), ["1", "2", "3"]);
    assert!(queue.is_empty("ann@x.com"));
    assert!(queue.owners().is_empty());
}

#[tokio::test]
async fn test_failure_stops_drain_and_keeps_suffix() {
    let (remote, queue, reconciler) = setup();
    for c in ["1", "2", "3", "4"] {
        queue.enqueue("ann@x.com", submit(c));
    }
    remote.fail_customer("3");

    let report = reconciler.drain_and_sync("ann@x.com").await;

    assert_eq!(report.replayed, 2);
    assert_eq!(report.remaining, 2);
    assert!(report.failed.is_some());
    assert_eq!(remote.customers(), ["1", "2"]);

    let left: Vec<_> = queue.pending("ann@x.com").into_iter().map(|p| p.mutation).collect();
    assert_eq!(left, vec![submit("3"), submit("4")]);

    // Next drain resumes from the failed entry
    remote.heal();
    let report = reconciler.drain_and_sync("ann@x.com").await;
    assert!(report.is_clean());
    assert_eq!(remote.customers(), ["1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_overlapping_drains_write_each_entry_once() {
    let (remote, queue, reconciler) = setup();
    for c in ["1", "2", "3", "4", "5"] {
        queue.enqueue("ann@x.com", submit(c));
    }

    let (a, b) = tokio::join!(
        reconciler.drain_and_sync("ann@x.com"),
        reconciler.drain_and_sync("ann@x.com")
    );

    assert_eq!(a.replayed + b.replayed, 5);
    assert_eq!(remote.customers(), ["1", "2", "3", "4", "5"]);
    assert_eq!(remote.write_attempts(), 5);
}

#[tokio::test]
async fn test_drain_all_covers_every_identity() {
    let (remote, queue, reconciler) = setup();
    queue.enqueue("ann@x.com", submit("1"));
    queue.enqueue("bob@x.com", submit("2"));
    queue.enqueue(
        "bob@x.com",
        Mutation::UpdateProfileName {
            email: "bob@x.com".to_string(),
            name: "Bob Stone".to_string(),
        },
    );

    let reports = reconciler.drain_all().await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|(_, r)| r.is_clean()));
    assert_eq!(remote.customers().len(), 2);
    let profiles = remote.profiles.lock().unwrap();
    assert_eq!(profiles["bob@x.com"].name.as_deref(), Some("Bob Stone"));
}

#[tokio::test]
async fn test_empty_queue_is_a_no_op() {
    let (remote, _queue, reconciler) = setup();
    let report = reconciler.drain_and_sync("ann@x.com").await;
    assert_eq!(report.replayed, 0);
    assert_eq!(remote.write_attempts(), 0);
}

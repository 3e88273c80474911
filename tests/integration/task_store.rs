//! Integration tests for the task store against the in-memory remote.
//!
//! Covers optimistic toggle and remove with rollback, non-optimistic
//! create, per-task conflicts, load reconciliation with pending mutations,
//! operations abandoned mid-call, and the derived statistics.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::time::Duration;

use teachmate::remote::memory::InMemoryRemote;
use teachmate::remote::{RemoteCall, TransportError};
use teachmate::tasks::{MutationKind, PendingOperation, StoreError, TaskStore};
use teachmate_proto::{Task, TaskId, TaskStats};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Builds a store over a remote holding `tasks` and loads it.
async fn loaded_store(tasks: Vec<Task>) -> (TaskStore<InMemoryRemote>, InMemoryRemote) {
    let remote = InMemoryRemote::with_tasks(tasks);
    let store = TaskStore::new(remote.clone());
    store.load().await.expect("initial load");
    (store, remote)
}

fn classroom() -> Vec<Task> {
    vec![
        Task::new(5, "Set quiz", false),
        Task::new(6, "Mark attendance", true),
        Task::new(7, "Grade papers", false),
    ]
}

fn mutation_calls(remote: &InMemoryRemote) -> Vec<RemoteCall> {
    remote
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, RemoteCall::List))
        .collect()
}

fn ids(store: &TaskStore<InMemoryRemote>) -> Vec<TaskId> {
    store.tasks().into_iter().map(|t| t.id).collect()
}

// ===========================================================================
// Rollback
// ===========================================================================

#[tokio::test]
async fn toggle_failure_restores_completed() {
    let (store, remote) = loaded_store(classroom()).await;
    for id in [5, 6, 7] {
        let before = store.get(&TaskId::Int(id)).unwrap();
        remote.fail_next(TransportError::Network("connection reset".into()));
        store.toggle(&before).await.unwrap_err();
        assert_eq!(store.get(&TaskId::Int(id)).unwrap(), before);
    }
    assert_eq!(remote.server_tasks(), classroom());
}

#[tokio::test]
async fn remove_failure_restores_index() {
    let (store, remote) = loaded_store(classroom()).await;
    for (index, id) in [5, 6, 7].into_iter().enumerate() {
        remote.fail_next(TransportError::Timeout);
        let err = store.remove(&TaskId::Int(id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Mutation { kind: MutationKind::Remove, .. }));
        assert_eq!(store.tasks()[index].id, TaskId::Int(id));
    }
    assert_eq!(store.tasks(), classroom());
}

#[tokio::test]
async fn toggle_failure_reports_server_detail() {
    let (store, remote) = loaded_store(vec![Task::new(7, "Grade papers", false)]).await;
    remote.fail_next(TransportError::with_detail(503, "server busy"));

    let err = store.toggle(&Task::new(7, "Grade papers", false)).await.unwrap_err();

    assert_eq!(err.message(), "server busy");
    assert!(!store.get(&TaskId::Int(7)).unwrap().completed);
    assert_eq!(store.last_error().as_deref(), Some("server busy"));
}

// ===========================================================================
// Abandoned operations
// ===========================================================================

const ABANDON_AFTER: Duration = Duration::from_millis(20);

#[tokio::test]
async fn timed_out_toggle_rolls_back_and_can_be_retried() {
    let (store, remote) = loaded_store(classroom()).await;
    let task = store.get(&TaskId::Int(5)).unwrap();
    remote.hold();

    let abandoned = tokio::time::timeout(ABANDON_AFTER, store.toggle(&task)).await;
    remote.release();

    assert!(abandoned.is_err());
    assert!(!store.is_pending(&TaskId::Int(5)));
    assert!(!store.get(&TaskId::Int(5)).unwrap().completed);
    assert!(store.pending_operations().is_empty());
    assert_eq!(remote.server_tasks(), classroom());

    let retried = store.toggle(&task).await.unwrap();
    assert!(retried.completed);
    assert!(remote.server_tasks()[0].completed);
}

#[tokio::test]
async fn timed_out_remove_restores_index_and_can_be_retried() {
    let (store, remote) = loaded_store(classroom()).await;
    remote.hold();

    let abandoned = tokio::time::timeout(ABANDON_AFTER, store.remove(&TaskId::Int(6))).await;
    remote.release();

    assert!(abandoned.is_err());
    assert!(!store.is_pending(&TaskId::Int(6)));
    assert_eq!(ids(&store), vec![TaskId::Int(5), TaskId::Int(6), TaskId::Int(7)]);
    assert_eq!(store.stats(), TaskStats { total: 3, completed: 1 });

    store.remove(&TaskId::Int(6)).await.unwrap();
    assert_eq!(ids(&store), vec![TaskId::Int(5), TaskId::Int(7)]);
    assert_eq!(remote.server_tasks().len(), 2);
}

#[tokio::test]
async fn select_losing_branch_frees_the_lock() {
    let (store, remote) = loaded_store(classroom()).await;
    let task = store.get(&TaskId::Int(7)).unwrap();
    remote.hold();

    tokio::select! {
        _ = store.toggle(&task) => panic!("held update must not settle"),
        () = tokio::time::sleep(ABANDON_AFTER) => {}
    }
    remote.release();

    assert!(store.snapshot().rows.iter().all(|row| !row.pending));
    store.remove(&TaskId::Int(7)).await.unwrap();
    assert!(store.get(&TaskId::Int(7)).is_none());
}

// ===========================================================================
// Create
// ===========================================================================

#[tokio::test]
async fn create_appends_exactly_the_server_record() {
    let (store, _remote) = loaded_store(vec![
        Task::new(1, "Set quiz", false),
        Task::new(6, "Mark attendance", true),
    ])
    .await;
    let before = store.stats();

    let created = store.create("Grade papers").await.unwrap();

    assert_eq!(created, Task::new(7, "Grade papers", false));
    assert_eq!(store.tasks().last(), Some(&created));
    let after = store.stats();
    assert_eq!(after.total, before.total + 1);
    assert_eq!(after.completed, before.completed);
}

#[tokio::test]
async fn concurrent_creates_of_same_title_both_land() {
    let (store, remote) = loaded_store(vec![]).await;
    let (a, b) = tokio::join!(store.create("Grade papers"), store.create("Grade papers"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);
    assert_eq!(store.tasks().len(), 2);
    assert_eq!(remote.server_tasks().len(), 2);
}

#[tokio::test]
async fn failed_create_keeps_title_for_retry() {
    let (store, remote) = loaded_store(vec![]).await;
    remote.fail_next(TransportError::with_detail(422, "Title must not be empty"));
    let err = store.create("Grade papers").await.unwrap_err();
    assert_eq!(err.attempted_title(), Some("Grade papers"));
    assert_eq!(err.message(), "Title must not be empty");
    assert!(store.tasks().is_empty());

    let retried = store.create(err.attempted_title().unwrap()).await.unwrap();
    assert_eq!(retried.title, "Grade papers");
}

// ===========================================================================
// Conflicts and concurrency
// ===========================================================================

#[tokio::test]
async fn distinct_toggles_settle_independently() {
    let (store, remote) = loaded_store(classroom()).await;
    let a = store.get(&TaskId::Int(5)).unwrap();
    let b = store.get(&TaskId::Int(6)).unwrap();
    // The first update arrives at the server first and takes the failure.
    remote.fail_next(TransportError::Timeout);

    let (ra, rb) = tokio::join!(store.toggle(&a), store.toggle(&b));

    ra.unwrap_err();
    assert!(!rb.unwrap().completed);
    assert!(!store.get(&TaskId::Int(5)).unwrap().completed);
    assert!(!store.get(&TaskId::Int(6)).unwrap().completed);
    assert!(store.pending_operations().is_empty());
}

#[tokio::test]
async fn second_toggle_of_same_task_conflicts_without_a_call() {
    let (store, remote) = loaded_store(classroom()).await;
    let task = store.get(&TaskId::Int(7)).unwrap();
    remote.hold();

    let second = async {
        let err = store.toggle(&task).await.unwrap_err();
        remote.release();
        err
    };
    let (first, err) = tokio::join!(store.toggle(&task), second);

    assert!(first.unwrap().completed);
    assert_eq!(err, StoreError::Conflict(TaskId::Int(7)));
    assert!(err.is_client_side());
    assert_eq!(
        mutation_calls(&remote),
        vec![RemoteCall::Update(Task::new(7, "Grade papers", true))]
    );
}

#[tokio::test]
async fn remove_while_toggle_pending_conflicts() {
    let (store, remote) = loaded_store(classroom()).await;
    let task = store.get(&TaskId::Int(5)).unwrap();
    remote.hold();

    let attempt = async {
        assert_eq!(
            store.pending_operations(),
            vec![PendingOperation::Toggle(TaskId::Int(5))]
        );
        let err = store.remove(&TaskId::Int(5)).await.unwrap_err();
        remote.release();
        err
    };
    let (toggled, err) = tokio::join!(store.toggle(&task), attempt);

    toggled.unwrap();
    assert_eq!(err, StoreError::Conflict(TaskId::Int(5)));
    assert_eq!(ids(&store), vec![TaskId::Int(5), TaskId::Int(6), TaskId::Int(7)]);
}

// ===========================================================================
// Load reconciliation
// ===========================================================================

#[tokio::test]
async fn load_keeps_tombstoned_task_hidden() {
    let (store, remote) = loaded_store(classroom()).await;
    remote.hold();

    let reload = async {
        // The server still lists task 7: the delete has not settled.
        assert!(remote.server_tasks().iter().any(|t| t.id == TaskId::Int(7)));
        store.load().await.unwrap();
        assert!(store.get(&TaskId::Int(7)).is_none());
        assert_eq!(store.stats().total, 2);
        remote.release();
    };
    let (removed, ()) = tokio::join!(store.remove(&TaskId::Int(7)), reload);

    removed.unwrap();
    assert!(store.get(&TaskId::Int(7)).is_none());
    store.load().await.unwrap();
    assert_eq!(ids(&store), vec![TaskId::Int(5), TaskId::Int(6)]);
}

#[tokio::test]
async fn tombstone_survives_load_and_rollback_restores() {
    let (store, remote) = loaded_store(classroom()).await;
    remote.hold();
    remote.fail_next(TransportError::Timeout);

    let reload = async {
        store.load().await.unwrap();
        assert!(store.get(&TaskId::Int(6)).is_none());
        remote.release();
    };
    let (removed, ()) = tokio::join!(store.remove(&TaskId::Int(6)), reload);

    removed.unwrap_err();
    assert_eq!(ids(&store), vec![TaskId::Int(5), TaskId::Int(6), TaskId::Int(7)]);
}

#[tokio::test]
async fn load_brings_in_other_clients_changes() {
    let (store, remote) = loaded_store(classroom()).await;
    let mut server = remote.server_tasks();
    server.push(Task::new(8, "Book lab", false));
    server[0].completed = true;
    remote.replace_tasks(server.clone());

    store.load().await.unwrap();

    assert_eq!(store.tasks(), server);
    assert_eq!(store.stats(), TaskStats { total: 4, completed: 2 });
}

#[tokio::test]
async fn stats_follow_optimistic_changes() {
    let (store, remote) = loaded_store(classroom()).await;
    let task = store.get(&TaskId::Int(5)).unwrap();
    remote.hold();
    remote.fail_next(TransportError::Timeout);

    let observe = async {
        assert_eq!(store.stats(), TaskStats { total: 3, completed: 2 });
        remote.release();
    };
    let (toggled, ()) = tokio::join!(store.toggle(&task), observe);

    toggled.unwrap_err();
    assert_eq!(store.stats(), TaskStats { total: 3, completed: 1 });
}

#[tokio::test]
async fn string_ids_are_supported() {
    let (store, remote) = loaded_store(vec![Task::new("a1", "Read chapter", false)]).await;
    store.toggle(&Task::new("a1", "Read chapter", false)).await.unwrap();
    assert!(remote.server_tasks()[0].completed);
    store.remove(&TaskId::from("a1")).await.unwrap();
    assert!(store.tasks().is_empty());
}

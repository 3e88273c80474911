//! Integration tests for the HTTP remote against an in-process
//! development server.
//!
//! Each test binds `teachmate-server` to `127.0.0.1:0` and drives a
//! `TaskStore` through `HttpTaskRemote`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use teachmate::config::ApiConfig;
use teachmate::remote::http::HttpTaskRemote;
use teachmate::remote::{TaskRemote, TransportError};
use teachmate::session::{Authenticator, Credentials, Session};
use teachmate::tasks::{StoreError, TaskStore};
use teachmate_proto::{NewTask, Task, TaskId, TaskStats};
use teachmate_server::registry::TaskRegistry;
use teachmate_server::routes::{self, ServerState};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn session() -> Session {
    Authenticator::new(Some(Credentials::new("CSEfac101", "pw")))
        .login("CSEfac101", "pw")
        .expect("login")
}

fn api(addr: SocketAddr) -> ApiConfig {
    ApiConfig {
        base_url: format!("http://{addr}"),
        tasks_path: "taskmanager".to_string(),
        request_timeout: Some(Duration::from_secs(5)),
    }
}

/// Starts a server over `registry` and returns a remote pointed at it.
async fn serve(registry: TaskRegistry) -> (HttpTaskRemote, Arc<ServerState>, JoinHandle<()>) {
    let state = Arc::new(ServerState::new(registry));
    let (addr, handle) = routes::start_server_with_state("127.0.0.1:0", "taskmanager", state.clone())
        .await
        .expect("start server");
    let remote = HttpTaskRemote::new(&api(addr), session()).expect("http client");
    (remote, state, handle)
}

// ===========================================================================
// Raw remote calls
// ===========================================================================

#[tokio::test]
async fn crud_round_trip() {
    let (remote, state, handle) = serve(TaskRegistry::new()).await;

    let created = remote.create(&NewTask::new("Grade papers")).await.unwrap();
    assert_eq!(created, Task::new(1, "Grade papers", false));

    let updated = remote.update(&created.toggled()).await.unwrap();
    assert!(updated.completed);

    assert_eq!(remote.list().await.unwrap(), vec![updated]);

    remote.delete(&TaskId::Int(1)).await.unwrap();
    assert!(state.registry.is_empty().await);
    handle.abort();
}

#[tokio::test]
async fn not_found_carries_detail() {
    let (remote, _state, handle) = serve(TaskRegistry::new()).await;
    let err = remote.delete(&TaskId::Int(42)).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Status {
            status: 404,
            detail: Some("Task 42 not found".to_string()),
        }
    );
    handle.abort();
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Bind then drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = HttpTaskRemote::new(&api(addr), session()).unwrap();
    let err = remote.list().await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "got {err:?}");
}

// ===========================================================================
// Store over HTTP
// ===========================================================================

#[tokio::test]
async fn store_syncs_with_server() {
    let (remote, state, handle) = serve(TaskRegistry::sample()).await;
    let store = TaskStore::new(remote);

    store.load().await.unwrap();
    assert_eq!(store.stats(), TaskStats { total: 4, completed: 1 });

    let task = store.get(&TaskId::Int(1)).unwrap();
    store.toggle(&task).await.unwrap();
    store.remove(&TaskId::Int(4)).await.unwrap();
    let created = store.create("Set quiz").await.unwrap();
    assert_eq!(created.id, TaskId::Int(5));

    assert_eq!(store.tasks(), state.registry.list().await);
    assert_eq!(store.stats(), TaskStats { total: 4, completed: 2 });
    handle.abort();
}

#[tokio::test]
async fn store_surfaces_server_detail_and_rolls_back() {
    let (remote, state, handle) = serve(TaskRegistry::sample()).await;
    let store = TaskStore::new(remote);
    store.load().await.unwrap();

    // Another client deletes task 2 behind our back.
    state.registry.delete(&TaskId::Int(2)).await.unwrap();

    let task = store.get(&TaskId::Int(2)).unwrap();
    let err = store.toggle(&task).await.unwrap_err();
    assert_eq!(err.message(), "Task 2 not found");
    assert_eq!(store.get(&TaskId::Int(2)).unwrap(), task);

    let err = store.remove(&TaskId::Int(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Mutation { .. }));
    assert_eq!(store.tasks()[1], task);

    store.load().await.unwrap();
    assert!(store.get(&TaskId::Int(2)).is_none());
    assert!(store.last_error().is_none());
    handle.abort();
}

#[tokio::test]
async fn load_failure_uses_generic_message() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = TaskStore::new(HttpTaskRemote::new(&api(addr), session()).unwrap());
    let err = store.load().await.unwrap_err();
    assert_eq!(err.message(), "Failed to fetch tasks");
    assert!(store.tasks().is_empty());
}

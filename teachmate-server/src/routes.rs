//! HTTP surface of the development server.
//!
//! Mirrors the hosted resource layout:
//!
//! - `GET /{path}/` lists tasks
//! - `POST /{path}/` creates a task from `{title, completed}`
//! - `PUT /{path}/{id}` replaces a task with the full body
//! - `DELETE /{path}/{id}` removes a task
//!
//! Failures carry a `{"detail": "..."}` body: 404 for unknown ids, 422 for
//! blank titles.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use teachmate_proto::{ErrorBody, NewTask, Task, TaskId};
use tokio::task::JoinHandle;

use crate::registry::{RegistryError, TaskRegistry};

/// Default collection path, matching the hosted backend.
pub const DEFAULT_TASKS_PATH: &str = "taskmanager";

/// Errors starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The bound address could not be read back.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Shared state for the request handlers.
#[derive(Debug, Default)]
pub struct ServerState {
    /// The task collection.
    pub registry: TaskRegistry,
}

impl ServerState {
    /// Wraps an existing registry.
    #[must_use]
    pub const fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptyTitle => StatusCode::UNPROCESSABLE_ENTITY,
        };
        tracing::debug!(%status, error = %self, "request rejected");
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Builds the router for the collection at `tasks_path`.
pub fn router(tasks_path: &str, state: Arc<ServerState>) -> axum::Router {
    let path = tasks_path.trim_matches('/');
    axum::Router::new()
        .route(&format!("/{path}/"), get(list_tasks).post(create_task))
        .route(&format!("/{path}/{{id}}"), put(update_task).delete(delete_task))
        .with_state(state)
}

/// Starts the server on `addr` with an empty collection at the default path.
///
/// # Errors
///
/// Returns [`ServerError`] if the address cannot be bound.
pub async fn start_server(addr: &str) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    start_server_with_state(addr, DEFAULT_TASKS_PATH, Arc::new(ServerState::default())).await
}

/// Starts the server on `addr` with custom shared state.
///
/// Returns the bound address (useful with port 0) and the serving task.
///
/// # Errors
///
/// Returns [`ServerError`] if the address cannot be bound.
pub async fn start_server_with_state(
    addr: &str,
    tasks_path: &str,
    state: Arc<ServerState>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let app = router(tasks_path, state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let bound_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn list_tasks(State(state): State<Arc<ServerState>>) -> Json<Vec<Task>> {
    Json(state.registry.list().await)
}

async fn create_task(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), RegistryError> {
    let task = state.registry.create(body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(body): Json<Task>,
) -> Result<Json<Task>, RegistryError> {
    let id = TaskId::from_path_segment(&id);
    Ok(Json(state.registry.update(&id, body).await?))
}

async fn delete_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RegistryError> {
    let id = TaskId::from_path_segment(&id);
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

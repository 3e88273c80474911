//! Remote task resource abstraction.
//!
//! Defines the [`TaskRemote`] trait that every backend for the task
//! collection must satisfy. Concrete implementations:
//! - [`http::HttpTaskRemote`]: the hosted REST resource, via reqwest
//! - [`memory::InMemoryRemote`]: in-process resource for tests and offline demos

pub mod http;
pub mod memory;

use std::future::Future;

use teachmate_proto::{NewTask, Task, TaskId};

/// Errors that can occur while talking to the task resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured HTTP timeout.
    #[error("request timed out")]
    Timeout,

    /// The resource answered with a non-success status.
    #[error("server responded with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-supplied explanation, if the body carried one.
        detail: Option<String>,
    },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Builds a status error carrying a server-supplied detail.
    pub fn with_detail(status: u16, detail: impl Into<String>) -> Self {
        Self::Status {
            status,
            detail: Some(detail.into()),
        }
    }

    /// Server-supplied detail text, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// A request issued against the task resource.
///
/// Recorded by [`memory::InMemoryRemote`] so tests can assert which calls
/// were (or were not) made.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `GET` of the whole collection.
    List,
    /// `POST` of a new task.
    Create(NewTask),
    /// `PUT` of a full task body.
    Update(Task),
    /// `DELETE` of a task by id.
    Delete(TaskId),
}

/// Async access to the remote task collection.
///
/// The remote is the authority for identifiers and for every field of a
/// task; callers treat returned records as the confirmed representation.
pub trait TaskRemote: Send + Sync {
    /// Fetch the full collection in server order.
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, TransportError>> + Send;

    /// Create a task and return it with its server-assigned id.
    fn create(&self, task: &NewTask) -> impl Future<Output = Result<Task, TransportError>> + Send;

    /// Replace a task with the given full body and return the stored result.
    fn update(&self, task: &Task) -> impl Future<Output = Result<Task, TransportError>> + Send;

    /// Delete a task by id.
    fn delete(&self, id: &TaskId) -> impl Future<Output = Result<(), TransportError>> + Send;
}

//! Client-side task collection kept in sync with the remote resource.
//!
//! [`TaskStore`] owns the collection and every in-flight mutation. Creation
//! waits for the server-assigned id before anything is shown; toggle and
//! remove are applied optimistically and rolled back if the remote call
//! fails. Each task id admits one in-flight mutation at a time.

pub mod pending;
pub mod store;

use std::fmt;

pub use pending::PendingOperation;
pub use store::{TaskRow, TaskSnapshot, TaskStore};

use teachmate_proto::{TaskId, TitleError};

use crate::remote::TransportError;

/// Which mutation a [`StoreError::Mutation`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// `create(title)`.
    Create,
    /// `toggle(task)`.
    Toggle,
    /// `remove(id)`.
    Remove,
}

impl MutationKind {
    /// Message shown when the server gave no detail.
    #[must_use]
    pub const fn generic_message(self) -> &'static str {
        match self {
            Self::Create => "Failed to add task",
            Self::Toggle => "Failed to update task",
            Self::Remove => "Failed to delete task",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "add"),
            Self::Toggle => write!(f, "update"),
            Self::Remove => write!(f, "delete"),
        }
    }
}

/// Message shown for a failed load when the server gave no detail.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to fetch tasks";

/// Errors reported by [`TaskStore`] operations.
///
/// `Validation`, `Conflict` and `UnknownTask` are detected before any
/// remote call. `Load` and `Mutation` mean a remote call was made and failed;
/// by the time they are returned the store has already rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The title was rejected locally.
    #[error(transparent)]
    Validation(#[from] TitleError),

    /// The task already has a mutation in flight.
    #[error("task {0} has an operation in progress")]
    Conflict(TaskId),

    /// The task is not in the readable collection.
    #[error("task {0} not found")]
    UnknownTask(TaskId),

    /// Fetching the collection failed.
    #[error("failed to fetch tasks: {0}")]
    Load(#[source] TransportError),

    /// A create, toggle or remove failed remotely.
    #[error("failed to {kind} task: {source}")]
    Mutation {
        /// Which operation failed.
        kind: MutationKind,
        /// Affected task, absent for creation.
        id: Option<TaskId>,
        /// Title of the affected or attempted task, for display and retry.
        title: Option<String>,
        /// Underlying transport failure.
        source: TransportError,
    },
}

impl StoreError {
    /// Text to show the user.
    ///
    /// Remote failures surface the server's `detail` verbatim when present,
    /// otherwise a generic message for the operation.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Load(source) => source
                .detail()
                .map_or_else(|| LOAD_FAILED_MESSAGE.to_string(), str::to_string),
            Self::Mutation { kind, source, .. } => source
                .detail()
                .map_or_else(|| kind.generic_message().to_string(), str::to_string),
            other => other.to_string(),
        }
    }

    /// The title the failed operation was working on, if known.
    #[must_use]
    pub fn attempted_title(&self) -> Option<&str> {
        match self {
            Self::Mutation { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    /// Whether the error was raised without contacting the remote.
    #[must_use]
    pub const fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict(_) | Self::UnknownTask(_)
        )
    }
}

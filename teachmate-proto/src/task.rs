//! Task resource types for the TeachMate task API.
//!
//! Defines the JSON representation exchanged with the `/taskmanager/`
//! resource: server-assigned identifiers, task records, the creation
//! payload, derived statistics, and title validation shared by the client
//! and the development server.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Identifier of a task, assigned by the remote authority.
///
/// The backend may hand out integer primary keys or opaque strings, so
/// both are accepted on the wire and compared by exact variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    /// Integer key (the common case for the hosted backend).
    Int(i64),
    /// Opaque string key.
    Text(String),
}

impl TaskId {
    /// Path segment used to address this task under the collection URL.
    #[must_use]
    pub fn as_path_segment(&self) -> String {
        self.to_string()
    }

    /// Reads an id from a path segment or user input.
    ///
    /// Numeric input becomes [`TaskId::Int`], anything else [`TaskId::Text`].
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map_or_else(|_| Self::Text(segment.to_string()), Self::Int)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_path_segment(s))
    }
}

/// A task record as returned by the remote resource.
///
/// Fields the client does not model are kept in `extra` and sent back
/// unchanged on update, so the server stays authoritative for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Server-assigned identifier. Never fabricated by the client.
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    /// Additional server-side fields, echoed back verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Creates a task record with no extra fields.
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, completed: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed,
            extra: Map::new(),
        }
    }

    /// Returns a copy of this task with `completed` inverted.
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Title of the task to create.
    pub title: String,
    /// Always `false` for tasks created by the client.
    #[serde(default)]
    pub completed: bool,
}

impl NewTask {
    /// Builds a create payload for a not-yet-completed task.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}

/// Error body returned by the resource on non-success responses.
///
/// `detail` is usually a string; validation failures may carry a
/// structured value instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable explanation of the failure.
    pub detail: Value,
}

impl ErrorBody {
    /// Builds an error body with a plain string detail.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Value::String(detail.into()),
        }
    }

    /// Renders the detail as display text.
    ///
    /// Strings are returned as-is; structured values are rendered as JSON.
    /// Returns `None` for a null or empty detail.
    #[must_use]
    pub fn detail_text(&self) -> Option<String> {
        match &self.detail {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Statistics derived from a task collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Number of tasks in the collection.
    pub total: usize,
    /// Number of completed tasks in the collection.
    pub completed: usize,
}

impl TaskStats {
    /// Computes statistics over a sequence of tasks.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |acc, task| Self {
            total: acc.total + 1,
            completed: acc.completed + usize::from(task.completed),
        })
    }

    /// Number of tasks still open.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

impl fmt::Display for TaskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Tasks: {} | Completed: {}",
            self.total, self.completed
        )
    }
}

/// Reasons a task title is rejected before reaching the resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Title is empty after trimming whitespace.
    #[error("task title cannot be empty")]
    Empty,
    /// Title exceeds the allowed number of characters.
    #[error("task title too long (max {max} characters)")]
    TooLong {
        /// Configured maximum length in characters.
        max: usize,
    },
}

/// Validates a task title and returns its trimmed form.
///
/// Length is counted in characters, not bytes.
///
/// # Errors
///
/// Returns [`TitleError::Empty`] if the title is blank, or
/// [`TitleError::TooLong`] if the trimmed title exceeds `max_len` characters.
pub fn validate_title(title: &str, max_len: usize) -> Result<&str, TitleError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TitleError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(TitleError::TooLong { max: max_len });
    }
    Ok(trimmed)
}

/// A few classroom tasks for demos and development seeding.
#[must_use]
pub fn sample_tasks() -> Vec<Task> {
    vec![
        Task::new(1, "Grade midterm papers", false),
        Task::new(2, "Prepare lecture slides for Unit 4", true),
        Task::new(3, "Update attendance records", false),
        Task::new(4, "Review lab submissions", false),
    ]
}

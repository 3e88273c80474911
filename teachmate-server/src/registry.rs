//! In-memory task collection behind the development server.
//!
//! The [`TaskRegistry`] assigns increasing integer ids and keeps tasks in
//! insertion order, which is the order `list` returns them in.

use teachmate_proto::{NewTask, Task, TaskId, sample_tasks};
use tokio::sync::RwLock;

/// Reasons the registry refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No task with this id.
    #[error("Task {0} not found")]
    NotFound(TaskId),

    /// The title is blank.
    #[error("Title must not be empty")]
    EmptyTitle,
}

#[derive(Debug)]
struct Collection {
    tasks: Vec<Task>,
    next_id: i64,
}

/// Task collection shared by the request handlers.
///
/// Thread-safe via [`RwLock`].
#[derive(Debug)]
pub struct TaskRegistry {
    inner: RwLock<Collection>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a registry holding `tasks`. New ids continue after the
    /// highest integer id present.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks
            .iter()
            .filter_map(|t| match t.id {
                TaskId::Int(n) => Some(n),
                TaskId::Text(_) => None,
            })
            .max()
            .map_or(1, |max| max + 1);
        Self {
            inner: RwLock::new(Collection { tasks, next_id }),
        }
    }

    /// Creates a registry seeded with the sample classroom tasks.
    #[must_use]
    pub fn sample() -> Self {
        Self::with_tasks(sample_tasks())
    }

    /// All tasks in insertion order.
    pub async fn list(&self) -> Vec<Task> {
        self.inner.read().await.tasks.clone()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }

    /// Stores a new task under the next id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyTitle`] for a blank title.
    pub async fn create(&self, new: NewTask) -> Result<Task, RegistryError> {
        if new.title.trim().is_empty() {
            return Err(RegistryError::EmptyTitle);
        }
        let mut inner = self.inner.write().await;
        let task = Task::new(inner.next_id, new.title, new.completed);
        inner.next_id += 1;
        inner.tasks.push(task.clone());
        drop(inner);
        tracing::info!(id = %task.id, "task created");
        Ok(task)
    }

    /// Replaces the task stored under `id` with `body`.
    ///
    /// The id in the path wins over any id in the body.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id or
    /// [`RegistryError::EmptyTitle`] for a blank title.
    pub async fn update(&self, id: &TaskId, mut body: Task) -> Result<Task, RegistryError> {
        if body.title.trim().is_empty() {
            return Err(RegistryError::EmptyTitle);
        }
        let mut inner = self.inner.write().await;
        let slot = inner
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        body.id = id.clone();
        *slot = body;
        let updated = slot.clone();
        drop(inner);
        tracing::info!(%id, completed = updated.completed, "task updated");
        Ok(updated)
    }

    /// Removes the task stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub async fn delete(&self, id: &TaskId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        let index = inner
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        inner.tasks.remove(index);
        drop(inner);
        tracing::info!(%id, "task deleted");
        Ok(())
    }
}

//! In-process task resource for testing and offline demos.
//!
//! [`InMemoryRemote`] behaves like the hosted resource (integer ids, 404 for
//! unknown tasks, 422 for blank titles) and adds two test controls:
//!
//! - failure injection: [`fail_next`](InMemoryRemote::fail_next),
//!   [`fail_next_for`](InMemoryRemote::fail_next_for) and
//!   [`fail_next_load`](InMemoryRemote::fail_next_load) queue errors that
//!   the next matching call returns instead of touching the collection;
//! - request gating: while [`hold`](InMemoryRemote::hold) is in effect,
//!   mutation calls are accepted but do not settle until
//!   [`release`](InMemoryRemote::release). `list` is never gated.
//!
//! Handles are cheap to clone and share the same collection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use teachmate_proto::{NewTask, Task, TaskId};
use tokio::sync::watch;

use super::{RemoteCall, TaskRemote, TransportError};

/// Shared in-memory task resource.
#[derive(Clone)]
pub struct InMemoryRemote {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<MemoryState>,
    /// `true` while mutations may settle.
    gate: watch::Sender<bool>,
}

#[derive(Default)]
struct MemoryState {
    tasks: Vec<Task>,
    next_id: i64,
    mutation_failures: VecDeque<TransportError>,
    task_failures: HashMap<TaskId, TransportError>,
    load_failures: VecDeque<TransportError>,
    calls: Vec<RemoteCall>,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    /// Creates an empty resource with an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a resource pre-populated with `tasks`.
    ///
    /// New ids continue after the highest integer id present.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks
            .iter()
            .filter_map(|t| match t.id {
                TaskId::Int(n) => Some(n),
                TaskId::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MemoryState {
                    tasks,
                    next_id,
                    ..MemoryState::default()
                }),
                gate,
            }),
        }
    }

    /// Creates a resource seeded with a few classroom tasks.
    #[must_use]
    pub fn sample() -> Self {
        Self::with_tasks(teachmate_proto::sample_tasks())
    }

    /// Makes the next mutation call (create, update or delete) fail with `err`.
    ///
    /// Queued failures are consumed in order, one per call.
    pub fn fail_next(&self, err: TransportError) {
        self.inner.state.lock().mutation_failures.push_back(err);
    }

    /// Makes the next update or delete of `id` fail with `err`.
    ///
    /// Takes precedence over failures queued with [`fail_next`](Self::fail_next).
    pub fn fail_next_for(&self, id: impl Into<TaskId>, err: TransportError) {
        self.inner.state.lock().task_failures.insert(id.into(), err);
    }

    /// Drops every queued failure.
    pub fn clear_failures(&self) {
        let mut state = self.inner.state.lock();
        state.mutation_failures.clear();
        state.load_failures.clear();
        state.task_failures.clear();
    }

    /// Makes the next `list` call fail with `err`.
    pub fn fail_next_load(&self, err: TransportError) {
        self.inner.state.lock().load_failures.push_back(err);
    }

    /// Stops mutation calls from settling until [`release`](Self::release).
    pub fn hold(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Lets held and future mutation calls settle.
    pub fn release(&self) {
        self.inner.gate.send_replace(true);
    }

    /// The resource's current collection, in server order.
    #[must_use]
    pub fn server_tasks(&self) -> Vec<Task> {
        self.inner.state.lock().tasks.clone()
    }

    /// Replaces the resource's collection, as another client would.
    pub fn replace_tasks(&self, tasks: Vec<Task>) {
        self.inner.state.lock().tasks = tasks;
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.inner.state.lock().calls.clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.state.lock().calls.len()
    }

    /// Records a mutation call and claims the failure queued for it, if any.
    fn accept(&self, call: RemoteCall) -> Option<TransportError> {
        let mut state = self.inner.state.lock();
        let targeted = match &call {
            RemoteCall::Update(task) => state.task_failures.remove(&task.id),
            RemoteCall::Delete(id) => state.task_failures.remove(id),
            RemoteCall::List | RemoteCall::Create(_) => None,
        };
        state.calls.push(call);
        targeted.or_else(|| state.mutation_failures.pop_front())
    }

    /// Waits until the gate is open.
    async fn settle(&self) -> Result<(), TransportError> {
        let mut gate = self.inner.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map(drop)
            .map_err(|_| TransportError::Network("in-memory remote shut down".to_string()))
    }
}

fn not_found(id: &TaskId) -> TransportError {
    TransportError::with_detail(404, format!("Task {id} not found"))
}

impl TaskRemote for InMemoryRemote {
    async fn list(&self) -> Result<Vec<Task>, TransportError> {
        let mut state = self.inner.state.lock();
        state.calls.push(RemoteCall::List);
        if let Some(err) = state.load_failures.pop_front() {
            return Err(err);
        }
        Ok(state.tasks.clone())
    }

    async fn create(&self, task: &NewTask) -> Result<Task, TransportError> {
        let failure = self.accept(RemoteCall::Create(task.clone()));
        self.settle().await?;
        if let Some(err) = failure {
            return Err(err);
        }
        if task.title.trim().is_empty() {
            return Err(TransportError::with_detail(422, "Title must not be empty"));
        }
        let mut state = self.inner.state.lock();
        let created = Task::new(state.next_id, task.title.clone(), task.completed);
        state.next_id += 1;
        state.tasks.push(created.clone());
        Ok(created)
    }

    async fn update(&self, task: &Task) -> Result<Task, TransportError> {
        let failure = self.accept(RemoteCall::Update(task.clone()));
        self.settle().await?;
        if let Some(err) = failure {
            return Err(err);
        }
        let mut state = self.inner.state.lock();
        let slot = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| not_found(&task.id))?;
        *slot = task.clone();
        Ok(slot.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TransportError> {
        let failure = self.accept(RemoteCall::Delete(id.clone()));
        self.settle().await?;
        if let Some(err) = failure {
            return Err(err);
        }
        let mut state = self.inner.state.lock();
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        state.tasks.remove(index);
        Ok(())
    }
}

//! The task store: collection, pending locks, reconciliation.
//!
//! All methods take `&self`, so operations on different tasks can be
//! awaited concurrently (e.g. with `tokio::join!`). The internal mutex is
//! only held between awaits, never across a remote call. Every state
//! change publishes a fresh [`TaskSnapshot`] on a `watch` channel for views.
//!
//! A future dropped before its remote call settles (timeout, `select!`)
//! undoes its local change and frees its lock, as if the call had failed.

use std::collections::HashSet;

use parking_lot::Mutex;
use teachmate_proto::{MAX_TASK_TITLE_LENGTH, NewTask, Task, TaskId, TaskStats, validate_title};
use tokio::sync::watch;

use super::pending::{Lock, PendingOperation, PendingSet};
use super::{MutationKind, StoreError};
use crate::remote::TaskRemote;

/// One task as a view sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    /// The task's current local representation.
    pub task: Task,
    /// Whether a mutation on this task is in flight.
    pub pending: bool,
}

/// Read-only projection of the store, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    /// Readable collection in server order.
    pub rows: Vec<TaskRow>,
    /// Titles of creations waiting for the server.
    pub creating: Vec<String>,
    /// A load is in flight.
    pub loading: bool,
    /// At least one load has succeeded.
    pub loaded: bool,
    /// Message of the most recent remote failure, until cleared.
    pub last_error: Option<String>,
}

impl TaskSnapshot {
    /// Statistics over the readable collection.
    #[must_use]
    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(self.rows.iter().map(|row| &row.task))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    pending: PendingSet,
    loads_in_flight: usize,
    /// Ticket handed to the most recently issued load.
    issued_load: u64,
    /// Ticket of the most recent load whose result was applied.
    applied_load: u64,
    loaded: bool,
    last_error: Option<String>,
}

impl StoreState {
    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            rows: self
                .tasks
                .iter()
                .map(|task| TaskRow {
                    task: task.clone(),
                    pending: self.pending.is_locked(&task.id),
                })
                .collect(),
            creating: self.pending.creating(),
            loading: self.loads_in_flight > 0,
            loaded: self.loaded,
            last_error: self.last_error.clone(),
        }
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// Replaces the collection with a server snapshot, keeping locked ids
    /// as they are locally.
    ///
    /// Tombstoned ids stay hidden (their stored copy is refreshed for a
    /// possible rollback). Ids with a pending toggle keep their optimistic
    /// local copy, including when the snapshot no longer lists them.
    fn apply_baseline(&mut self, incoming: Vec<Task>) {
        let mut seen = HashSet::with_capacity(incoming.len());
        let mut next = Vec::with_capacity(incoming.len());

        for task in incoming {
            if !seen.insert(task.id.clone()) {
                tracing::warn!(id = %task.id, "server listed a task twice; keeping the first");
                continue;
            }
            match self.pending.lock_mut(&task.id) {
                Some(Lock::Remove { task: stored, .. }) => *stored = task,
                Some(Lock::Toggle { .. }) => {
                    let local = self
                        .tasks
                        .iter()
                        .find(|t| t.id == task.id)
                        .cloned()
                        .unwrap_or(task);
                    next.push(local);
                }
                None => next.push(task),
            }
        }

        for (index, task) in self.tasks.iter().enumerate() {
            if self.pending.is_toggling(&task.id) && !seen.contains(&task.id) {
                next.insert(index.min(next.len()), task.clone());
            }
        }

        self.tasks = next;
    }

    /// Frees the lock on `id` and undoes its optimistic change.
    fn roll_back(&mut self, id: &TaskId) {
        match self.pending.release(id) {
            Some(Lock::Toggle { previous }) => {
                if let Some(slot) = self.find_mut(id) {
                    slot.completed = previous;
                }
            }
            Some(Lock::Remove { task, index }) => {
                let at = index.min(self.tasks.len());
                self.tasks.insert(at, task);
            }
            None => {}
        }
    }

    /// Adds a task returned by a successful create.
    fn commit_created(&mut self, task: Task) {
        if let Some(existing) = self.find_mut(&task.id) {
            // A load that finished first already brought it in.
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }
}

/// Bookkeeping an operation owes the store until its remote call settles.
#[derive(Debug)]
enum InFlight {
    Load,
    Create(u64),
    Mutation(TaskId),
}

/// Undoes an operation's bookkeeping if its future is dropped mid-call.
///
/// Must be settled before the state mutex is taken again.
struct SettleGuard<'a> {
    state: &'a Mutex<StoreState>,
    changes: &'a watch::Sender<TaskSnapshot>,
    owed: Option<InFlight>,
}

impl SettleGuard<'_> {
    /// The call settled; the caller now does its own cleanup.
    fn settle(mut self) {
        self.owed = None;
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        let Some(owed) = self.owed.take() else {
            return;
        };
        let mut state = self.state.lock();
        match &owed {
            InFlight::Load => state.loads_in_flight = state.loads_in_flight.saturating_sub(1),
            InFlight::Create(ticket) => state.pending.end_create(*ticket),
            InFlight::Mutation(id) => state.roll_back(id),
        }
        tracing::warn!(?owed, "operation dropped before the remote call settled; undone");
        self.changes.send_replace(state.snapshot());
    }
}

/// Owns the task collection and mediates every change to it.
pub struct TaskStore<R> {
    remote: R,
    state: Mutex<StoreState>,
    changes: watch::Sender<TaskSnapshot>,
    max_title_len: usize,
}

impl<R: TaskRemote> TaskStore<R> {
    /// Creates an empty store over `remote`.
    pub fn new(remote: R) -> Self {
        let (changes, _) = watch::channel(TaskSnapshot::default());
        Self {
            remote,
            state: Mutex::new(StoreState::default()),
            changes,
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Sets the maximum accepted title length in characters.
    #[must_use]
    pub fn with_max_title_len(mut self, max_title_len: usize) -> Self {
        self.max_title_len = max_title_len;
        self
    }

    /// The remote this store talks to.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Fetches the collection and makes it the new baseline.
    ///
    /// Ids with a mutation in flight are left as they are locally. If a newer
    /// load has already been applied, this result is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the fetch fails; the collection is
    /// left unchanged.
    pub async fn load(&self) -> Result<(), StoreError> {
        let ticket = {
            let mut state = self.state.lock();
            state.issued_load += 1;
            state.loads_in_flight += 1;
            self.publish(&state);
            state.issued_load
        };
        tracing::debug!(ticket, "loading tasks");

        let in_flight = self.in_flight(InFlight::Load);
        let result = self.remote.list().await;
        in_flight.settle();

        let mut state = self.state.lock();
        state.loads_in_flight -= 1;
        match result {
            Ok(tasks) => {
                if ticket > state.applied_load {
                    state.applied_load = ticket;
                    let fetched = tasks.len();
                    state.apply_baseline(tasks);
                    state.loaded = true;
                    state.last_error = None;
                    tracing::info!(fetched, visible = state.tasks.len(), "tasks loaded");
                } else {
                    tracing::debug!(ticket, "dropping result of a superseded load");
                }
                self.publish(&state);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(error = %source, "failed to load tasks");
                let err = StoreError::Load(source);
                state.last_error = Some(err.message());
                self.publish(&state);
                Err(err)
            }
        }
    }

    /// Creates a task and appends the server's record once it is assigned
    /// an id. Nothing is shown while the request is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a blank or overlong title
    /// (no remote call), or [`StoreError::Mutation`] if the server rejects
    /// the creation.
    pub async fn create(&self, title: &str) -> Result<Task, StoreError> {
        let title = validate_title(title, self.max_title_len)?.to_string();
        let ticket = {
            let mut state = self.state.lock();
            let ticket = state.pending.begin_create(&title);
            self.publish(&state);
            ticket
        };
        tracing::debug!(%title, "creating task");

        let in_flight = self.in_flight(InFlight::Create(ticket));
        let result = self.remote.create(&NewTask::new(title.clone())).await;
        in_flight.settle();

        let mut state = self.state.lock();
        state.pending.end_create(ticket);
        match result {
            Ok(task) => {
                tracing::info!(id = %task.id, "task created");
                state.commit_created(task.clone());
                self.publish(&state);
                Ok(task)
            }
            Err(source) => {
                tracing::warn!(%title, error = %source, "failed to create task");
                let err = StoreError::Mutation {
                    kind: MutationKind::Create,
                    id: None,
                    title: Some(title),
                    source,
                };
                state.last_error = Some(err.message());
                self.publish(&state);
                Err(err)
            }
        }
    }

    /// Flips `completed` on a task immediately, then confirms with the server.
    ///
    /// The request carries the store's current copy of the task with the
    /// flag inverted. On success the server's record replaces the local one
    /// wholesale; on failure the flag is restored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the task is already pending,
    /// [`StoreError::UnknownTask`] if it is not in the collection (neither
    /// issues a remote call), or [`StoreError::Mutation`] after rolling back
    /// a failed update.
    pub async fn toggle(&self, task: &Task) -> Result<Task, StoreError> {
        self.toggle_id(&task.id).await
    }

    /// Same as [`toggle`](Self::toggle), addressed by id.
    ///
    /// # Errors
    ///
    /// See [`toggle`](Self::toggle).
    pub async fn toggle_id(&self, id: &TaskId) -> Result<Task, StoreError> {
        let id = id.clone();
        let request = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.pending.is_locked(&id) {
                return Err(StoreError::Conflict(id));
            }
            let Some(current) = state.tasks.iter_mut().find(|t| t.id == id) else {
                return Err(StoreError::UnknownTask(id));
            };
            let previous = current.completed;
            current.completed = !previous;
            let request = current.clone();
            let acquired = state.pending.acquire(id.clone(), Lock::Toggle { previous });
            debug_assert!(acquired, "lock checked above under the same mutex");
            self.publish(state);
            request
        };
        tracing::debug!(%id, completed = request.completed, "toggling task");

        let in_flight = self.in_flight(InFlight::Mutation(id.clone()));
        let result = self.remote.update(&request).await;
        in_flight.settle();

        let mut state = self.state.lock();
        match result {
            Ok(mut updated) => {
                state.pending.release(&id);
                if updated.id != id {
                    tracing::warn!(%id, returned = %updated.id, "server changed a task id; keeping ours");
                    updated.id = id.clone();
                }
                if let Some(slot) = state.find_mut(&id) {
                    *slot = updated.clone();
                }
                self.publish(&state);
                Ok(updated)
            }
            Err(source) => {
                state.roll_back(&id);
                tracing::warn!(%id, error = %source, "toggle failed; rolled back");
                let err = StoreError::Mutation {
                    kind: MutationKind::Toggle,
                    id: Some(id),
                    title: Some(request.title),
                    source,
                };
                state.last_error = Some(err.message());
                self.publish(&state);
                Err(err)
            }
        }
    }

    /// Removes a task immediately, then confirms with the server.
    ///
    /// The id stays locked as a tombstone until the delete settles. On
    /// failure the task is put back at its original index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the task is already pending,
    /// [`StoreError::UnknownTask`] if it is not in the collection (neither
    /// issues a remote call), or [`StoreError::Mutation`] after restoring
    /// the task.
    pub async fn remove(&self, id: &TaskId) -> Result<(), StoreError> {
        let title = {
            let mut state = self.state.lock();
            if state.pending.is_locked(id) {
                return Err(StoreError::Conflict(id.clone()));
            }
            let Some(index) = state.position(id) else {
                return Err(StoreError::UnknownTask(id.clone()));
            };
            let task = state.tasks.remove(index);
            let title = task.title.clone();
            let acquired = state.pending.acquire(id.clone(), Lock::Remove { task, index });
            debug_assert!(acquired, "lock checked above under the same mutex");
            self.publish(&state);
            title
        };
        tracing::debug!(%id, "removing task");

        let in_flight = self.in_flight(InFlight::Mutation(id.clone()));
        let result = self.remote.delete(id).await;
        in_flight.settle();

        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.pending.release(id);
                tracing::info!(%id, "task removed");
                self.publish(&state);
                Ok(())
            }
            Err(source) => {
                state.roll_back(id);
                tracing::warn!(%id, error = %source, "remove failed; task restored");
                let err = StoreError::Mutation {
                    kind: MutationKind::Remove,
                    id: Some(id.clone()),
                    title: Some(title),
                    source,
                };
                state.last_error = Some(err.message());
                self.publish(&state);
                Err(err)
            }
        }
    }

    /// Statistics over the readable collection. Never touches the remote.
    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.state.lock().tasks)
    }

    /// The readable collection in server order.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// The readable copy of one task.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        let state = self.state.lock();
        state.position(id).map(|index| state.tasks[index].clone())
    }

    /// Maps user-typed text to the id of a task in the collection.
    ///
    /// A task whose id prints as `raw` wins, so `"7"` reaches a task with
    /// string id `"7"` as well as one with integer id `7`. Text matching no
    /// visible task is parsed as a path segment.
    pub fn resolve_id(&self, raw: &str) -> TaskId {
        let state = self.state.lock();
        state
            .tasks
            .iter()
            .map(|task| &task.id)
            .find(|id| id.to_string() == raw)
            .cloned()
            .unwrap_or_else(|| TaskId::from_path_segment(raw))
    }

    /// Whether a mutation on `id` is in flight (including tombstones).
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.state.lock().pending.is_locked(id)
    }

    /// Every in-flight mutation.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.state.lock().pending.operations()
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.lock().loads_in_flight > 0
    }

    /// Message of the most recent remote failure.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Clears the last error.
    pub fn dismiss_error(&self) {
        let mut state = self.state.lock();
        if state.last_error.take().is_some() {
            self.publish(&state);
        }
    }

    /// Current projection for views.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.lock().snapshot()
    }

    /// Subscribes to snapshots published after every change.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.changes.subscribe()
    }

    const fn in_flight(&self, owed: InFlight) -> SettleGuard<'_> {
        SettleGuard {
            state: &self.state,
            changes: &self.changes,
            owed: Some(owed),
        }
    }

    /// Publishes the current state. Called with the state lock held so
    /// snapshots go out in commit order.
    fn publish(&self, state: &StoreState) {
        self.changes.send_replace(state.snapshot());
    }
}

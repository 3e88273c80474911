//! Bookkeeping for in-flight mutations.
//!
//! Every toggle or remove holds a per-id lock until its remote call
//! settles. The lock carries what is needed to undo the optimistic change:
//! the previous `completed` value for a toggle, the removed task and its
//! index for a remove (the tombstone). Creations have no id yet and are
//! tracked by ticket.

use std::collections::{BTreeMap, HashMap};

use teachmate_proto::{Task, TaskId};

/// An in-flight mutation, as shown to views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperation {
    /// Waiting for the server to assign an id to a new task.
    Create(String),
    /// Waiting for the server to confirm a completion flip.
    Toggle(TaskId),
    /// Waiting for the server to confirm a deletion.
    Remove(TaskId),
}

/// Undo information held while a task id is locked.
#[derive(Debug, Clone)]
pub(crate) enum Lock {
    Toggle { previous: bool },
    Remove { task: Task, index: usize },
}

/// Per-id locks plus in-flight creations.
#[derive(Debug, Default)]
pub(crate) struct PendingSet {
    locks: HashMap<TaskId, Lock>,
    creates: BTreeMap<u64, String>,
    next_ticket: u64,
}

impl PendingSet {
    /// Locks `id`. Returns `false` (and changes nothing) if already locked.
    #[must_use]
    pub(crate) fn acquire(&mut self, id: TaskId, lock: Lock) -> bool {
        if self.locks.contains_key(&id) {
            return false;
        }
        self.locks.insert(id, lock);
        true
    }

    /// Unlocks `id`, returning its undo information.
    pub(crate) fn release(&mut self, id: &TaskId) -> Option<Lock> {
        self.locks.remove(id)
    }

    pub(crate) fn is_locked(&self, id: &TaskId) -> bool {
        self.locks.contains_key(id)
    }

    pub(crate) fn is_toggling(&self, id: &TaskId) -> bool {
        matches!(self.locks.get(id), Some(Lock::Toggle { .. }))
    }

    pub(crate) fn lock_mut(&mut self, id: &TaskId) -> Option<&mut Lock> {
        self.locks.get_mut(id)
    }

    /// Registers a creation and returns its ticket.
    pub(crate) fn begin_create(&mut self, title: &str) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.creates.insert(ticket, title.to_string());
        ticket
    }

    pub(crate) fn end_create(&mut self, ticket: u64) {
        self.creates.remove(&ticket);
    }

    /// Titles of creations still waiting for the server, oldest first.
    pub(crate) fn creating(&self) -> Vec<String> {
        self.creates.values().cloned().collect()
    }

    /// Every in-flight operation: creations oldest first, then locks by id.
    pub(crate) fn operations(&self) -> Vec<PendingOperation> {
        let mut locked: Vec<PendingOperation> = self
            .locks
            .iter()
            .map(|(id, lock)| match lock {
                Lock::Toggle { .. } => PendingOperation::Toggle(id.clone()),
                Lock::Remove { .. } => PendingOperation::Remove(id.clone()),
            })
            .collect();
        locked.sort_by(|a, b| pending_id(a).cmp(&pending_id(b)));
        self.creates
            .values()
            .cloned()
            .map(PendingOperation::Create)
            .chain(locked)
            .collect()
    }
}

const fn pending_id(op: &PendingOperation) -> Option<&TaskId> {
    match op {
        PendingOperation::Create(_) => None,
        PendingOperation::Toggle(id) | PendingOperation::Remove(id) => Some(id),
    }
}

//! Text views over the task store.
//!
//! A view is a pure function of a [`TaskSnapshot`]: it never holds task
//! state of its own. User intent goes through [`dispatch`], which checks the
//! view's [`Controls`] and forwards to the store. [`ViewBinding`] keeps a
//! view attached to the store's change channel.

pub mod dashboard;
pub mod task_list;

pub use dashboard::DashboardTaskWidget;
pub use task_list::TaskListView;

use teachmate_proto::TaskId;
use tokio::sync::watch;

use crate::remote::TaskRemote;
use crate::tasks::{StoreError, TaskRow, TaskSnapshot, TaskStore};

/// Which store operations a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Controls {
    /// Creating tasks.
    pub create: bool,
    /// Flipping completion.
    pub toggle: bool,
    /// Deleting tasks.
    pub remove: bool,
    /// Whether the stats header is shown.
    pub stats: bool,
}

/// Something the user asked a view to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Refetch the collection.
    Reload,
    /// Add a task with this title.
    Create(String),
    /// Flip completion of a task.
    Toggle(TaskId),
    /// Delete a task.
    Remove(TaskId),
}

impl ViewAction {
    const fn label(&self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Create(_) => "create",
            Self::Toggle(_) => "toggle",
            Self::Remove(_) => "remove",
        }
    }
}

/// Errors from [`dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// The view does not expose this operation.
    #[error("{view} does not support {action}")]
    Unsupported {
        /// View name.
        view: &'static str,
        /// Rejected action.
        action: &'static str,
    },

    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A read-only rendering of the task store.
pub trait TaskView {
    /// Short name used in messages.
    fn name(&self) -> &'static str;

    /// Operations this view offers.
    fn controls(&self) -> Controls;

    /// Renders a snapshot as text.
    fn render(&self, snapshot: &TaskSnapshot) -> String;
}

/// Forwards a user action to the store if the view exposes it.
///
/// # Errors
///
/// Returns [`ViewError::Unsupported`] for an action outside the view's
/// controls (the store is not touched), otherwise whatever the store returns.
pub async fn dispatch<V, R>(view: &V, store: &TaskStore<R>, action: ViewAction) -> Result<(), ViewError>
where
    V: TaskView + ?Sized,
    R: TaskRemote,
{
    let controls = view.controls();
    let allowed = match action {
        ViewAction::Reload => true,
        ViewAction::Create(_) => controls.create,
        ViewAction::Toggle(_) => controls.toggle,
        ViewAction::Remove(_) => controls.remove,
    };
    if !allowed {
        return Err(ViewError::Unsupported {
            view: view.name(),
            action: action.label(),
        });
    }

    tracing::debug!(view = view.name(), action = action.label(), "dispatching");
    match action {
        ViewAction::Reload => store.load().await?,
        ViewAction::Create(title) => {
            store.create(&title).await?;
        }
        ViewAction::Toggle(id) => {
            store.toggle_id(&id).await?;
        }
        ViewAction::Remove(id) => store.remove(&id).await?,
    }
    Ok(())
}

/// A view subscribed to a store's snapshots.
pub struct ViewBinding<V> {
    view: V,
    changes: watch::Receiver<TaskSnapshot>,
}

impl<V: TaskView> ViewBinding<V> {
    /// Attaches `view` to `store`.
    pub fn new<R: TaskRemote>(view: V, store: &TaskStore<R>) -> Self {
        Self {
            view,
            changes: store.subscribe(),
        }
    }

    /// The bound view.
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Whether the store published since the last render.
    pub fn is_stale(&self) -> bool {
        self.changes.has_changed().unwrap_or(false)
    }

    /// Renders the most recent snapshot and marks it seen.
    pub fn render_latest(&mut self) -> String {
        let snapshot = self.changes.borrow_and_update();
        self.view.render(&snapshot)
    }

    /// Waits for the next published snapshot and renders it.
    ///
    /// Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<String> {
        self.changes.changed().await.ok()?;
        Some(self.render_latest())
    }
}

/// One task line: checkbox, id, title and a pending marker.
pub(crate) fn render_row(out: &mut String, row: &TaskRow) {
    let checkbox = if row.task.completed { "[x]" } else { "[ ]" };
    out.push_str(&format!("{checkbox} #{} {}", row.task.id, row.task.title));
    if row.pending {
        out.push_str("  (saving...)");
    }
    out.push('\n');
}

/// The stats header, for views whose controls ask for it.
pub(crate) fn render_stats(out: &mut String, controls: Controls, snapshot: &TaskSnapshot) {
    if controls.stats {
        out.push_str(&format!("{}\n", snapshot.stats()));
    }
}

/// Loading and error lines shared by both views.
///
/// Returns `false` when rows should be hidden (loading).
pub(crate) fn render_status(out: &mut String, snapshot: &TaskSnapshot) -> bool {
    if let Some(err) = &snapshot.last_error {
        out.push_str(&format!("Error: {err}\n"));
    }
    if snapshot.loading {
        out.push_str("Loading tasks...\n");
        return false;
    }
    true
}

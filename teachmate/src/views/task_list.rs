//! The full task manager view.

use super::{Controls, TaskView, render_row, render_stats, render_status};
use crate::tasks::TaskSnapshot;

/// Title, completion, stats header, create and delete controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskListView;

impl TaskListView {
    /// Creates the view.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TaskView for TaskListView {
    fn name(&self) -> &'static str {
        "task manager"
    }

    fn controls(&self) -> Controls {
        Controls {
            create: true,
            toggle: true,
            remove: true,
            stats: true,
        }
    }

    fn render(&self, snapshot: &TaskSnapshot) -> String {
        let mut out = String::from("Task Management\n");
        render_stats(&mut out, self.controls(), snapshot);

        if !render_status(&mut out, snapshot) {
            return out;
        }
        for title in &snapshot.creating {
            out.push_str(&format!("[ ] {title}  (adding...)\n"));
        }
        for row in &snapshot.rows {
            render_row(&mut out, row);
        }
        if snapshot.rows.is_empty() && snapshot.creating.is_empty() && snapshot.loaded {
            out.push_str("No tasks yet.\n");
        }
        out
    }
}

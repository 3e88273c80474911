//! Compact task widget shown on the dashboard.

use super::{Controls, TaskView, render_row, render_stats, render_status};
use crate::tasks::TaskSnapshot;

/// Greeting plus the task list with completion toggles only.
#[derive(Debug, Clone)]
pub struct DashboardTaskWidget {
    user: String,
}

impl DashboardTaskWidget {
    /// Creates the widget greeting `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl TaskView for DashboardTaskWidget {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn controls(&self) -> Controls {
        Controls {
            create: false,
            toggle: true,
            remove: false,
            stats: false,
        }
    }

    fn render(&self, snapshot: &TaskSnapshot) -> String {
        let mut out = format!("Hello, {}!\nWelcome to your dashboard\n\nYour Tasks\n", self.user);
        render_stats(&mut out, self.controls(), snapshot);
        if !render_status(&mut out, snapshot) {
            return out;
        }
        for row in &snapshot.rows {
            render_row(&mut out, row);
        }
        out
    }
}

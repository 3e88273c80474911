//! Shared wire definitions for the TeachMate task resource.

pub mod task;

pub use task::{
    ErrorBody, MAX_TASK_TITLE_LENGTH, NewTask, Task, TaskId, TaskStats, TitleError, sample_tasks,
    validate_title,
};

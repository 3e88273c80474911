//! `TeachMate` task client library.
//!
//! A task collection kept in sync with a remote resource: optimistic
//! toggle and remove with rollback, per-task pending locks, and read-only
//! views over store snapshots.

pub mod config;
pub mod remote;
pub mod session;
pub mod tasks;
pub mod views;

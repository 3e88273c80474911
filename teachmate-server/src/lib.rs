//! `TeachMate` development server library.
//!
//! Serves the task resource from memory over HTTP so the client can be run
//! and tested without the hosted backend.

pub mod config;
pub mod registry;
pub mod routes;

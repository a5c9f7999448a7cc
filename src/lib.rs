//! Bulk removal of a user's own posts and comments from a DCInside gallog.
//!
//! The engine logs in, walks the activity log, and deletes each entry,
//! solving captcha challenges through an external service when one is
//! configured. [`service::CleanerService`] is the entry point for front ends.

pub mod cancel;
pub mod catalog;
pub mod challenge;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod remote;
pub mod service;
pub mod session;
pub mod state_machine;

#[cfg(test)]
mod testing;

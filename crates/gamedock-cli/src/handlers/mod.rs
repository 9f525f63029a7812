//! Command handlers.
//!
//! Each handler receives the composed [`crate::CliContext`] and delegates
//! to the scheduler, the compression runner, or the repositories.

pub mod check;
pub mod compression;
pub mod queue;
pub mod run;
pub mod settings;

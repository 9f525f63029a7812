//! gamedock CLI library.
//!
//! Exposes the parser, the composition root, and the command handlers so
//! the binary stays a thin dispatcher and the pieces can be tested.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod settings_commands;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;

//! Presentation layer for CLI output.

mod queue_display;
mod tables;

pub use queue_display::{format_bytes, format_eta, format_rate, print_entry_table, progress_cell};
pub use tables::{format_optional, print_separator, truncate_string};

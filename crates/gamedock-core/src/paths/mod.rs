//! Path utilities for gamedock data directories and the game library.
//!
//! - Database location under the application data root
//! - Library directory (where games are installed)
//! - Archive directory (where compressed copies are written)
//!
//! Returns `PathBuf` and `PathError`; no interactive I/O.

mod database;
mod error;
mod library;
mod platform;

#[cfg(test)]
mod test_utils;

pub use database::database_path;
pub use error::PathError;
pub use library::{
    DEFAULT_ARCHIVE_DIR_NAME, DEFAULT_LIBRARY_DIR_RELATIVE, archive_dir_for, default_library_dir,
    resolve_library_dir,
};
pub use platform::data_root;

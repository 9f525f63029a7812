//! Library and archive directory resolution.

use std::env;
use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::normalize_user_path;

/// Default library location under the user's home directory.
pub const DEFAULT_LIBRARY_DIR_RELATIVE: &str = "Games/gamedock";

pub(super) const LIBRARY_DIR_ENV: &str = "GAMEDOCK_LIBRARY_DIR";

/// Return the default library directory (`~/Games/gamedock`).
pub fn default_library_dir() -> Result<PathBuf, PathError> {
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join(DEFAULT_LIBRARY_DIR_RELATIVE))
}

/// Resolve the library directory.
///
/// Resolution order:
/// 1. Explicit path provided by caller (settings or CLI flag)
/// 2. `GAMEDOCK_LIBRARY_DIR` environment variable
/// 3. [`default_library_dir`]
pub fn resolve_library_dir(explicit: Option<&str>) -> Result<PathBuf, PathError> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return normalize_user_path(path);
    }

    if let Ok(env_path) = env::var(LIBRARY_DIR_ENV) {
        if !env_path.trim().is_empty() {
            tracing::debug!(path = %env_path, "library dir from environment");
            return normalize_user_path(&env_path);
        }
    }

    default_library_dir()
}

/// Default archive directory name inside the library. Install directory
/// names never start with `.`, so no resource can collide with it.
pub const DEFAULT_ARCHIVE_DIR_NAME: &str = ".archives";

/// Resolve the archive directory: an explicit path, or `<library>/.archives`.
pub fn archive_dir_for(library: &Path, explicit: Option<&str>) -> Result<PathBuf, PathError> {
    match explicit.filter(|p| !p.trim().is_empty()) {
        Some(path) => normalize_user_path(path),
        None => Ok(library.join(DEFAULT_ARCHIVE_DIR_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{ENV_LOCK, EnvVarGuard};
    use super::*;

    #[test]
    fn test_explicit_beats_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(LIBRARY_DIR_ENV, "/tmp/from-env");
        let path = resolve_library_dir(Some("/tmp/explicit")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit"));
    }

    #[test]
    fn test_env_used_without_explicit() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(LIBRARY_DIR_ENV, "/tmp/from-env");
        assert_eq!(
            resolve_library_dir(None).unwrap(),
            PathBuf::from("/tmp/from-env")
        );
        assert_eq!(
            resolve_library_dir(Some("  ")).unwrap(),
            PathBuf::from("/tmp/from-env")
        );
    }

    #[test]
    fn test_default_library_dir() {
        let dir = default_library_dir().unwrap();
        assert!(dir.ends_with(DEFAULT_LIBRARY_DIR_RELATIVE));
    }

    #[test]
    fn test_archive_dir_defaults_under_library() {
        let lib = PathBuf::from("/srv/games");
        assert_eq!(
            archive_dir_for(&lib, None).unwrap(),
            PathBuf::from("/srv/games/.archives")
        );
        assert_eq!(
            archive_dir_for(&lib, Some("/mnt/cold")).unwrap(),
            PathBuf::from("/mnt/cold")
        );
    }
}

//! On-disk layout of the game library.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use gamedock_core::CompressionFormat;

/// Where installs and archives live for each resource.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    library_dir: PathBuf,
    archive_dir: PathBuf,
}

impl LibraryLayout {
    /// Create a layout.
    pub fn new(library_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Base directory for installs.
    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// Base directory for archives.
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Install directory for a resource. Exclusively owned by its transfer
    /// until the entry is terminal.
    pub fn install_dir(&self, resource_id: &str) -> PathBuf {
        self.library_dir.join(safe_name(resource_id))
    }

    /// Output path for a resource's archive.
    pub fn archive_path(&self, resource_id: &str, format: CompressionFormat) -> PathBuf {
        self.archive_dir
            .join(format!("{}.{}", safe_name(resource_id), format.extension()))
    }
}

/// Encode a resource id as one path segment.
///
/// Separators, drive markers, `%` and a leading `.` are percent-encoded, so
/// distinct ids never share a directory and no id maps to a dot-prefixed
/// name such as the default archive directory.
fn safe_name(resource_id: &str) -> String {
    if resource_id.is_empty() {
        return "%".to_string();
    }
    let mut name = String::with_capacity(resource_id.len());
    for (i, c) in resource_id.chars().enumerate() {
        match c {
            '/' | '\\' | ':' | '%' => {
                let _ = write!(name, "%{:02X}", u32::from(c));
            }
            '.' if i == 0 => name.push_str("%2E"),
            c => name.push(c),
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_dir_is_one_segment() {
        let layout = LibraryLayout::new("/games", "/archives");
        assert_eq!(layout.install_dir("440"), PathBuf::from("/games/440"));
        assert_eq!(layout.install_dir("a/b:c"), PathBuf::from("/games/a%2Fb%3Ac"));
        assert_eq!(layout.install_dir("a\\b"), PathBuf::from("/games/a%5Cb"));
        assert_eq!(layout.install_dir(".."), PathBuf::from("/games/%2E."));
        assert_eq!(layout.install_dir(""), PathBuf::from("/games/%"));
    }

    #[test]
    fn distinct_ids_get_distinct_dirs() {
        let layout = LibraryLayout::new("/games", "/games/.archives");
        let ids = ["a/b", "a_b", "a%2Fb", "a:b", "a\\b", ".x", "%2Ex", ""];
        let dirs: std::collections::HashSet<_> =
            ids.iter().map(|id| layout.install_dir(id)).collect();
        assert_eq!(dirs.len(), ids.len());
    }

    #[test]
    fn no_id_lands_on_archive_dir() {
        let layout = LibraryLayout::new("/games", "/games/.archives");
        assert_ne!(layout.install_dir(".archives"), layout.archive_dir());
        assert_eq!(layout.install_dir("archives"), PathBuf::from("/games/archives"));
    }

    #[test]
    fn archive_path_uses_format_extension() {
        let layout = LibraryLayout::new("/games", "/archives");
        assert_eq!(
            layout.archive_path("440", CompressionFormat::TarGz),
            PathBuf::from("/archives/440.tar.gz")
        );
        assert_eq!(
            layout.archive_path("440", CompressionFormat::Zip),
            PathBuf::from("/archives/440.zip")
        );
    }
}

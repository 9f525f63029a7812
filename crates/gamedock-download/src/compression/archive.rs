//! Archive backend: walks an install directory and streams it into a
//! single zip or tar.gz file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use gamedock_core::{CompressionError, CompressionFormat};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<ArchiveError> for CompressionError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(e) => Self::from_io_error(&e),
            ArchiveError::Zip(e) => Self::archive(e.to_string()),
        }
    }
}

/// Streaming compressor.
///
/// `on_progress` receives the cumulative number of source bytes written
/// after each entry. Implementations flush and sync the output before
/// returning the archive size.
pub trait ArchiveBackend: Send + Sync {
    fn write_archive(
        &self,
        source: &Path,
        output: &Path,
        format: CompressionFormat,
        level: u32,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ArchiveError>;
}

/// One file or directory under the source root.
#[derive(Debug)]
struct WalkEntry {
    path: PathBuf,
    /// `/`-separated path relative to the source root.
    name: String,
    is_dir: bool,
    size: u64,
}

/// Recursive walk in sorted order. Symlinks are skipped.
fn walk(root: &Path) -> io::Result<Vec<WalkEntry>> {
    let mut out = Vec::new();
    walk_into(root, "", &mut out)?;
    Ok(out)
}

fn walk_into(dir: &Path, prefix: &str, out: &mut Vec<WalkEntry>) -> io::Result<()> {
    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(fs::DirEntry::file_name);

    for child in children {
        let meta = fs::symlink_metadata(child.path())?;
        if meta.file_type().is_symlink() {
            continue;
        }
        let name = format!("{prefix}{}", child.file_name().to_string_lossy());
        if meta.is_dir() {
            out.push(WalkEntry {
                path: child.path(),
                name: name.clone(),
                is_dir: true,
                size: 0,
            });
            walk_into(&child.path(), &format!("{name}/"), out)?;
        } else {
            out.push(WalkEntry {
                path: child.path(),
                name,
                is_dir: false,
                size: meta.len(),
            });
        }
    }
    Ok(())
}

/// Total size in bytes of the regular files under `root`.
pub fn dir_size(root: &Path) -> io::Result<u64> {
    Ok(walk(root)?.iter().map(|e| e.size).sum())
}

/// Writes archives with the `zip` and `tar`/`flate2` crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArchiveBackend;

impl FsArchiveBackend {
    fn write_zip(
        entries: &[WalkEntry],
        output: &Path,
        level: u32,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ArchiveError> {
        let options = if level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level.min(9))))
        }
        .large_file(true);

        let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
        let mut processed = 0u64;
        for entry in entries {
            if entry.is_dir {
                zip.add_directory(format!("{}/", entry.name), options)?;
                continue;
            }
            zip.start_file(entry.name.clone(), options)?;
            let mut file = File::open(&entry.path)?;
            io::copy(&mut file, &mut zip)?;
            processed += entry.size;
            on_progress(processed);
        }

        let file = zip.finish()?.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(file.metadata()?.len())
    }

    fn write_tar_gz(
        entries: &[WalkEntry],
        output: &Path,
        level: u32,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ArchiveError> {
        let encoder = GzEncoder::new(
            BufWriter::new(File::create(output)?),
            Compression::new(level.min(9)),
        );
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut processed = 0u64;
        for entry in entries {
            if entry.is_dir {
                builder.append_dir(&entry.name, &entry.path)?;
                continue;
            }
            builder.append_path_with_name(&entry.path, &entry.name)?;
            processed += entry.size;
            on_progress(processed);
        }

        let mut writer = builder.into_inner()?.finish()?;
        writer.flush()?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(file.metadata()?.len())
    }
}

impl ArchiveBackend for FsArchiveBackend {
    fn write_archive(
        &self,
        source: &Path,
        output: &Path,
        format: CompressionFormat,
        level: u32,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ArchiveError> {
        let entries = walk(source)?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        match format {
            CompressionFormat::Zip => Self::write_zip(&entries, output, level, on_progress),
            CompressionFormat::TarGz => Self::write_tar_gz(&entries, output, level, on_progress),
        }
    }
}

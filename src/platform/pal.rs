//! Filesystem collaborator trait and the std-backed implementation.
//!
//! The deletion engine consumes exactly this surface: existence checks,
//! immediate-children listings, per-file metadata, non-recursive deletion, and
//! the per-volume free-space query. Keeping it behind a trait lets tests pin
//! free-space numbers without touching real statvfs.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::{Result, SfrError};

/// Metadata the engine needs for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Filesystem surface consumed by the walker and evictor.
///
/// `remove_dir` is non-recursive and must fail on a non-empty directory; the
/// engine relies on that as a last-line guard against deleting trees it did
/// not fully inspect.
pub trait Filesystem: Send + Sync {
    fn dir_exists(&self, path: &Path) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
    /// Immediate child files of `dir` (no recursion, enumeration order as-is).
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    /// Immediate child directories of `dir`.
    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn file_metadata(&self, path: &Path) -> Result<FileMeta>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Delete an empty directory; fails if non-empty.
    fn remove_dir(&self, path: &Path) -> Result<()>;
    /// Free bytes available on the volume containing `root`.
    fn free_space(&self, root: &Path) -> Result<u64>;
}

/// Production implementation over `std::fs` + `statvfs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl StdFilesystem {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn list_children(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|source| SfrError::io(dir, source))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SfrError::io(dir, source))?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            // Symlinks are neither followed nor deleted; they do count as
            // directory content for emptiness purposes via list_files.
            if want_dirs {
                if file_type.is_dir() {
                    out.push(entry.path());
                }
            } else if !file_type.is_dir() {
                out.push(entry.path());
            }
        }
        Ok(out)
    }
}

impl Filesystem for StdFilesystem {
    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Self::list_children(dir, false)
    }

    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Self::list_children(dir, true)
    }

    fn file_metadata(&self, path: &Path) -> Result<FileMeta> {
        let meta = fs::symlink_metadata(path).map_err(|source| SfrError::io(path, source))?;
        Ok(FileMeta {
            size_bytes: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|source| SfrError::io(path, source))
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).map_err(|source| SfrError::io(path, source))
    }

    fn free_space(&self, root: &Path) -> Result<u64> {
        free_space_impl(root)
    }
}

#[cfg(unix)]
fn free_space_impl(root: &Path) -> Result<u64> {
    let stat = nix::sys::statvfs::statvfs(root).map_err(|error| SfrError::FreeSpaceQuery {
        root: root.to_path_buf(),
        details: error.to_string(),
    })?;
    // Bytes available to unprivileged callers; fragment size is the correct
    // multiplier on Linux (block size can differ).
    let fragment: u64 = stat.fragment_size().into();
    let blocks: u64 = stat.blocks_available().into();
    Ok(blocks * fragment)
}

#[cfg(not(unix))]
fn free_space_impl(root: &Path) -> Result<u64> {
    Err(SfrError::FreeSpaceQuery {
        root: root.to_path_buf(),
        details: "free-space query unsupported on this platform".to_string(),
    })
}

//! On-disk cache of fetched specs.
//!
//! Cached files hold the exact bytes that were fetched. Every write goes
//! through [`write_atomic`]: bytes land in a sibling temp file which is then
//! renamed over the target, so a reader sees either the old file or the new
//! one, never a truncated mix.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A cached file could not be read.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cached copy at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file could not be written. Always fatal: cache integrity cannot be
/// guaranteed past this point.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Filesystem store for cached spec files, addressed by paths relative to
/// its root.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, dest: &Path) -> PathBuf {
        self.root.join(dest)
    }

    pub fn exists(&self, dest: &Path) -> bool {
        self.path_for(dest).is_file()
    }

    pub fn read(&self, dest: &Path) -> Result<Vec<u8>, CacheError> {
        read_file(&self.path_for(dest))
    }

    /// Atomically replace the cached copy of `dest`.
    pub fn write(&self, dest: &Path, bytes: &[u8]) -> Result<(), WriteError> {
        write_atomic(&self.path_for(dest), bytes)
    }

    /// True when `dest` has no cached copy or its bytes differ from
    /// `candidate`. The comparison is byte-for-byte, not semantic.
    pub fn changed(&self, dest: &Path, candidate: &[u8]) -> Result<bool, CacheError> {
        match self.read(dest) {
            Ok(existing) => Ok(existing != candidate),
            Err(CacheError::NotFound { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, CacheError> {
    std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => CacheError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CacheError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Write `bytes` to `path` via a temp file in the same directory.
///
/// Parent directories are created as needed. If anything fails the temp
/// file is removed and `path` keeps its previous contents.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    write_atomic_with_tmp(path, bytes, &temp_path_for(path))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.openapi-sync.tmp"))
}

fn write_atomic_with_tmp(path: &Path, bytes: &[u8], tmp: &Path) -> Result<(), WriteError> {
    let fail = |path: &Path, source| WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail(parent, e))?;
    }

    let written = std::fs::File::create(tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(tmp);
        return Err(fail(tmp, e));
    }

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(fail(path, e));
    }

    // Persist the rename itself. Some filesystems refuse fsync on a
    // directory, so a failure here is only logged.
    #[cfg(unix)]
    if let Err(e) = sync_dir(parent_dir(path)) {
        tracing::warn!(path = %path.display(), error = %e, "failed to sync cache directory");
    }

    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

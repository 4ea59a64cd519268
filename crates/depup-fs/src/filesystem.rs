//! Async filesystem abstraction and atomic-write primitives.
//!
//! **What**: Defines [`AsyncFileSystem`], a small trait covering the file
//! operations the rest of this workspace needs, a concrete [`TokioFileSystem`]
//! implementation, and free functions implementing atomic file replacement
//! (write-to-temp-then-rename) with permission preservation and backup/restore.
//!
//! **How**: Mirrors the teacher's `FileSystemManager` (tokio::fs-backed,
//! async-only), but adds the atomic-write contract this workspace actually
//! needs: a temp file in the *same* directory as the target (required for
//! the rename to be atomic on POSIX filesystems), removed unconditionally on
//! any failure, with no `.tmp*` artifact surviving a successful call.
//!
//! **Why**: Manifests and lock files are shared mutable state read by other
//! tools between runs; a torn write (partial content visible mid-write) is
//! worse than a failed update. See depup-core's drift checker and executor
//! for how this guarantee is relied upon during rollback.

use crate::error::{FileSystemError, FsResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Default file mode used when no prior mode is known and none was requested.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Async trait defining the filesystem operations this workspace depends on.
///
/// Kept deliberately small (compared to the teacher's much larger
/// `AsyncFileSystem`): depup-core never walks directory trees or queries
/// glob patterns, so those teacher operations were dropped rather than
/// carried as dead weight.
#[async_trait]
pub trait AsyncFileSystem: Send + Sync {
    /// Reads a file and returns its contents as bytes.
    async fn read_file(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Reads a file and returns its contents as a UTF-8 string.
    async fn read_file_string(&self, path: &Path) -> FsResult<String> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes).map_err(|e| FileSystemError::Io {
            path: path.to_path_buf(),
            message: format!("invalid UTF-8: {e}"),
        })
    }

    /// Writes `contents` to `path`, creating parent directories as needed.
    ///
    /// This is a direct, non-atomic write — callers that need atomicity use
    /// [`write_file_atomic`] instead.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> FsResult<()>;

    /// Returns whether `path` exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Returns the POSIX file mode bits for `path`.
    ///
    /// On non-Unix targets this always returns [`DEFAULT_FILE_MODE`]; mode
    /// preservation across platforms without POSIX permission bits is out of
    /// scope, and callers on such platforms get a fixed, documented mode
    /// rather than a silent no-op.
    async fn file_mode(&self, path: &Path) -> FsResult<u32>;

    /// Sets the POSIX file mode bits for `path`.
    ///
    /// No-op on non-Unix targets.
    async fn set_file_mode(&self, path: &Path, mode: u32) -> FsResult<()>;

    /// Creates `path` and all missing parent directories.
    async fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    /// Removes a file. Not an error if the file is already absent.
    async fn remove_file(&self, path: &Path) -> FsResult<()>;

    /// Renames `from` to `to`. Callers are responsible for ensuring both
    /// paths are on the same filesystem when atomicity is required.
    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;
}

/// Concrete [`AsyncFileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AsyncFileSystem for TokioFileSystem {
    async fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        fs::read(path).await.map_err(|e| FileSystemError::from_io(&e, path))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            if !self.exists(parent).await {
                self.create_dir_all(parent).await?;
            }
        }
        fs::write(path, contents).await.map_err(|e| FileSystemError::from_io(&e, path))
    }

    async fn exists(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to check path existence, treating as non-existent"
                );
                false
            }
        }
    }

    #[cfg(unix)]
    async fn file_mode(&self, path: &Path) -> FsResult<u32> {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path).await.map_err(|e| FileSystemError::from_io(&e, path))?;
        Ok(meta.permissions().mode() & 0o777)
    }

    #[cfg(not(unix))]
    async fn file_mode(&self, _path: &Path) -> FsResult<u32> {
        Ok(DEFAULT_FILE_MODE)
    }

    #[cfg(unix)]
    async fn set_file_mode(&self, path: &Path, mode: u32) -> FsResult<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| FileSystemError::from_io(&e, path))
    }

    #[cfg(not(unix))]
    async fn set_file_mode(&self, _path: &Path, _mode: u32) -> FsResult<()> {
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        fs::create_dir_all(path).await.map_err(|e| FileSystemError::from_io(&e, path))
    }

    async fn remove_file(&self, path: &Path) -> FsResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileSystemError::from_io(&e, path)),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        fs::rename(from, to).await.map_err(|e| FileSystemError::from_io(&e, to))
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path_for(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("depup");
    let suffix = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(".{name}.tmp{}-{suffix}", std::process::id()))
}

/// Writes `data` to `path` atomically: writes to a sibling temp file in the
/// same directory, then renames it over `path`. On any failure the temp file
/// is removed; no `.tmp*` artifact is ever left behind.
///
/// `mode` is applied to the temp file before the rename so the final file
/// never briefly exists with the wrong permissions.
pub async fn write_file_atomic<F: AsyncFileSystem>(
    fs: &F,
    path: &Path,
    data: &[u8],
    mode: u32,
) -> FsResult<()> {
    let tmp = temp_path_for(path);

    if let Some(parent) = path.parent() {
        if !fs.exists(parent).await {
            fs.create_dir_all(parent).await?;
        }
    }

    let result: FsResult<()> = async {
        fs.write_file(&tmp, data).await?;
        fs.set_file_mode(&tmp, mode).await?;
        fs.rename(&tmp, path).await?;
        Ok(())
    }
    .await;

    if let Err(err) = result {
        let cleanup = match fs.remove_file(&tmp).await {
            Ok(()) => "removed".to_string(),
            Err(cleanup_err) => {
                tracing::warn!(
                    tmp = %tmp.display(),
                    target = %path.display(),
                    error = %cleanup_err,
                    "atomic write failed and its temp file could not be cleaned up; manual removal may be required"
                );
                cleanup_err.to_string()
            }
        };
        return Err(FileSystemError::AtomicWriteFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
            cleanup,
        });
    }

    Ok(())
}

/// Writes `data` to `path`, preserving the existing file's mode if it exists,
/// or falling back to `default_mode` for a new file.
pub async fn write_file_preserving_permissions<F: AsyncFileSystem>(
    fs: &F,
    path: &Path,
    data: &[u8],
    default_mode: u32,
) -> FsResult<()> {
    let mode = if fs.exists(path).await { fs.file_mode(path).await? } else { default_mode };
    write_file_atomic(fs, path, data, mode).await
}

/// A captured snapshot of a single file, taken before a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBackup {
    /// Absolute (or workspace-relative) path the content was read from.
    pub path: PathBuf,
    /// Raw file content at backup time.
    pub content: Vec<u8>,
    /// File mode at backup time, to restore exactly.
    pub mode: u32,
}

/// Captures `(path, content, mode)` for every path in `paths` that exists.
///
/// Missing paths are silently skipped — this is the documented policy, not
/// an oversight: a plan may reference a lock file that doesn't exist yet in
/// ecosystems without one, and that must not abort the whole backup.
pub async fn backup_files<F: AsyncFileSystem>(
    fs: &F,
    paths: &[PathBuf],
) -> FsResult<Vec<FileBackup>> {
    let mut backups = Vec::with_capacity(paths.len());
    for path in paths {
        if !fs.exists(path).await {
            continue;
        }
        let content = fs.read_file(path).await?;
        let mode = fs.file_mode(path).await?;
        backups.push(FileBackup { path: path.clone(), content, mode });
    }
    Ok(backups)
}

/// Restores every backup, writing each file back atomically with its
/// original mode. Does not stop at the first failure: every path is
/// attempted, and every failure is collected and returned.
pub async fn restore_backups<F: AsyncFileSystem>(
    fs: &F,
    backups: &[FileBackup],
) -> Vec<FileSystemError> {
    let mut errors = Vec::new();
    for backup in backups {
        if let Err(e) = write_file_atomic(fs, &backup.path, &backup.content, backup.mode).await {
            errors.push(e);
        }
    }
    errors
}

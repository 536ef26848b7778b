//! The staging area and the atomic promotion of staged files.
//!
//! A sync run owns one [`StagingArea`]: a fresh directory with a random
//! name and owner-only permissions under the configured root.  Fresh
//! downloads land there first; only after they have been compared are
//! changed files promoted over the installed copies, each through a temp
//! file in the destination directory followed by a rename.  A reader of an
//! installed file therefore sees either the old content or the new content,
//! never a mix or a truncation.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Name prefix of every staging directory.
pub const STAGING_PREFIX: &str = "playlist_update_check";

/// The only fatal sync failures: the staging directory could not be set up
/// or torn down.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot prepare staging area {path}: {source}")]
    Staging { path: PathBuf, source: io::Error },
    #[error("cannot remove staging area {path}: {source}")]
    Cleanup { path: PathBuf, source: io::Error },
}

/// Temporary directory holding candidate files for one run.
///
/// Dropping it without calling [`StagingArea::remove`] still deletes the
/// directory, so early returns and unwinding do not leave it behind.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a private, uniquely named directory under `root`.  Leftovers
    /// of interrupted runs under the same root are swept first.
    pub async fn create(root: &Path) -> Result<Self, SyncError> {
        let staging_err = |source| SyncError::Staging {
            path: root.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(root).await.map_err(staging_err)?;
        sweep_leftovers(root).await;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(staging_err)?;
        debug!("staging: created {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a fetched candidate into the staging area.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.file_path(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Delete the staging directory.  Failure here is fatal for the run.
    pub async fn remove(self) -> Result<(), SyncError> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        let closed = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(io::Error::other)
            .and_then(|r| r);
        match closed {
            Ok(()) => {
                debug!("staging: removed {}", path.display());
                Ok(())
            }
            Err(source) => Err(SyncError::Cleanup { path, source }),
        }
    }
}

/// Best effort: directories this user cannot remove are left alone.
async fn sweep_leftovers(root: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(root).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        let is_dir = tokio::fs::symlink_metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => debug!("staging: removed stale {}", path.display()),
            Err(e) => debug!("staging: left {} in place: {}", path.display(), e),
        }
    }
}

/// Replace `target` with the content of `staged` via write-then-rename.
///
/// The temp file lives next to `target` so the rename never crosses a
/// filesystem.  Permissions of an existing `target` are carried over.
pub fn promote_file(staged: &Path, target: &Path) -> io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".playlistupd-")
        .tempfile_in(dir)?;
    let mut src = std::fs::File::open(staged)?;
    io::copy(&mut src, tmp.as_file_mut())?;
    if let Ok(meta) = std::fs::metadata(target) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Async wrapper running [`promote_file`] on the blocking pool.
pub async fn promote(staged: PathBuf, target: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || promote_file(&staged, &target))
        .await
        .map_err(io::Error::other)?
}

//! Temporary build workspace bound to the process working directory.
//!
//! A [`WorkspaceScope`] creates a fresh temporary directory, makes it the
//! current directory and, when dropped, returns to the directory that was
//! current at acquisition before deleting the workspace. The restore runs on
//! every exit path, including `?` propagation and unwinding.

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "esp-build-";

/// Guard over one temporary working directory
#[derive(Debug)]
pub struct WorkspaceScope {
    saved_dir: PathBuf,
    // Dropped after `Drop::drop` has restored `saved_dir`
    dir: TempDir,
}

impl WorkspaceScope {
    /// Create an empty workspace and enter it
    pub fn acquire() -> Result<Self> {
        let saved_dir = std::env::current_dir().map_err(|e| {
            BuildError::Workspace(format!("Cannot determine current directory: {}", e))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(|e| BuildError::Workspace(format!("Cannot create workspace: {}", e)))?;

        std::env::set_current_dir(dir.path()).map_err(|e| {
            BuildError::Workspace(format!(
                "Cannot enter workspace {}: {}",
                dir.path().display(),
                e
            ))
        })?;

        log::debug!(
            "[Workspace] Entered {} (saved {})",
            dir.path().display(),
            saved_dir.display()
        );

        Ok(WorkspaceScope { saved_dir, dir })
    }

    /// Absolute path of the workspace
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory restored when the scope ends
    pub fn saved_dir(&self) -> &Path {
        &self.saved_dir
    }
}

impl Drop for WorkspaceScope {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.saved_dir) {
            log::warn!(
                "[Workspace] Failed to restore working directory {}: {}",
                self.saved_dir.display(),
                e
            );
        } else {
            log::debug!("[Workspace] Restored {}", self.saved_dir.display());
        }
    }
}

//! Per-request workspace management
//!
//! A workspace is a uniquely named, initially empty directory that holds one
//! request's source file and build artifacts. It is removed when the request
//! finishes, whichever way it finishes.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const WORKSPACE_PREFIX: &str = "coderun-";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace under {root}: {source}")]
    Create {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exclusively owned scratch directory for one request
///
/// # Cleanup
///
/// Call [`release()`](Self::release) when the request is done so removal
/// errors can be observed. If the workspace is dropped without being released
/// (an early return or a panic unwinding through the pipeline), the directory
/// is still removed recursively, and a warning is logged.
#[derive(Debug)]
pub struct Workspace {
    /// Backing directory; `None` once released
    dir: Option<TempDir>,

    /// Path of the directory, kept for logging after release
    root: PathBuf,
}

impl Workspace {
    /// Create a new, empty workspace under `parent`
    ///
    /// Names are random and created with exclusive semantics, so concurrent
    /// acquisitions never share a directory.
    #[instrument]
    pub fn acquire(parent: &Path) -> Result<Self, WorkspaceError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| WorkspaceError::Create {
                root: parent.to_path_buf(),
                source,
            })?;
        let root = dir.path().to_path_buf();

        debug!(?root, "workspace acquired");

        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    /// Path to the workspace directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Get the host path to a file inside the workspace
    ///
    /// Returns an error if the name would escape the workspace.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if !is_safe_file_name(name) {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.root.join(name))
    }

    /// Write the submitted source into the workspace under `file_name`
    #[instrument(skip(self, source), fields(workspace = %self.root.display()))]
    pub async fn stage(&self, file_name: &str, source: &[u8]) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(file_name)?;
        tokio::fs::write(&path, source).await?;
        debug!(?path, len = source.len(), "staged source file");
        Ok(path)
    }

    /// Recursively delete the workspace
    #[must_use = "release errors should be handled"]
    #[instrument(skip(self), fields(workspace = %self.root.display()))]
    pub async fn release(mut self) -> Result<(), WorkspaceError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = self.root.clone();

        let removal = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(std::io::Error::other)
            .and_then(|result| result);

        match removal {
            Ok(()) => {
                debug!("workspace released");
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "workspace removal failed");
                Err(WorkspaceError::Remove { path, source })
            }
        }
    }
}

/// Whether `name` stays inside the directory it is joined to
pub(crate) fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.starts_with('/')
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            // TempDir's own Drop removes the directory right after this
            warn!(
                workspace = %self.root.display(),
                "workspace dropped without explicit release, removing it now"
            );
        }
    }
}

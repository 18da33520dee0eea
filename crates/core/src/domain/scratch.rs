// Scratch Directory - scoped, call-private working area

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive guard over a freshly created scratch directory
///
/// Removed exactly once: either by `release()` or, failing that, on drop.
/// Removal failure is only ever logged; it never replaces the retrieval outcome.
#[derive(Debug)]
pub struct ScratchDirectory {
    path: PathBuf,
    released: bool,
}

impl ScratchDirectory {
    /// Take ownership of a directory that the caller has just created
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory off the runtime worker and report the outcome
    pub async fn release(mut self) -> io::Result<()> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Scratch directory removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchDirectory {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // no await in drop: last-resort synchronous removal
        if let Err(e) = remove_tree(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        }
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Scratch directory removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

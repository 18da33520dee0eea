// Tracked File & Revision Identifier

use crate::error::{Result, RetrievalError};
use std::path::{Path, PathBuf};

/// A file under version control, addressed by absolute path
///
/// The retrieval subsystem never writes to it or to its history file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedFile {
    path: PathBuf,
}

impl TrackedFile {
    /// Relative paths are resolved against the current directory
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = if path.is_relative() {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        } else {
            path
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Containing directory (`/` for a root-level file)
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Final path component, lossily converted
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path of a file beside this one, e.g. `sibling("s.", "")` for SCCS history
    pub fn sibling(&self, prefix: &str, suffix: &str) -> PathBuf {
        self.directory()
            .join(format!("{}{}{}", prefix, self.base_name(), suffix))
    }
}

impl From<&Path> for TrackedFile {
    fn from(path: &Path) -> Self {
        TrackedFile::new(path)
    }
}

impl From<PathBuf> for TrackedFile {
    fn from(path: PathBuf) -> Self {
        TrackedFile::new(path)
    }
}

/// Opaque backend-defined revision name (e.g. SCCS delta `1.3`)
///
/// Never interpreted, only passed through to the tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject identifiers no backend could ever resolve
    ///
    /// Empty names and names with NUL or line breaks would either be dropped by the
    /// tool's argument parser or smuggle extra input into it.
    pub fn validate(&self, file: &TrackedFile) -> Result<()> {
        let reason = if self.0.is_empty() {
            Some("empty revision identifier")
        } else if self.0.chars().any(|c| c == '\0' || c == '\n' || c == '\r') {
            Some("malformed revision identifier")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RetrievalError::RevisionNotFound {
                file: file.path().to_path_buf(),
                revision: self.0.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        RevisionId::new(s)
    }
}

impl From<String> for RevisionId {
    fn from(s: String) -> Self {
        RevisionId::new(s)
    }
}

// Central Error Type for Revision Retrieval

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Retrieval error taxonomy
///
/// Every variant carries enough context (tool, file, revision, captured stderr)
/// for the caller to log it and decide whether to skip or retry.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The backend executable could not be located or started
    #[error("Tool not found: {tool}: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The revision (or the history file holding it) does not exist
    #[error("Revision not found: {} at {revision}: {reason}", file.display())]
    RevisionNotFound {
        file: PathBuf,
        revision: String,
        reason: String,
    },

    /// The tool ran and failed, timed out, or piping its output failed
    #[error("Backend I/O error: {tool} on {} at {revision}: {message}", file.display())]
    BackendIo {
        tool: String,
        file: PathBuf,
        revision: String,
        exit_code: Option<i32>,
        stderr: String,
        message: String,
    },

    /// Scratch space could not be created
    #[error("Resource error: {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),
}

impl RetrievalError {
    /// True when the caller can safely skip the file (expected condition)
    pub fn is_revision_not_found(&self) -> bool {
        matches!(self, RetrievalError::RevisionNotFound { .. })
    }

    /// Captured stderr of the failed tool, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RetrievalError::BackendIo { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }

    /// Recover the typed error carried inside an `io::Error`
    ///
    /// Streams report failures through `AsyncRead`, which only speaks `io::Error`.
    /// Errors that did not originate from a retrieval are wrapped as `BackendIo`.
    pub fn from_io(err: io::Error) -> Self {
        let carries_retrieval = err
            .get_ref()
            .map(|inner| inner.is::<RetrievalError>())
            .unwrap_or(false);

        if carries_retrieval {
            if let Some(inner) = err.into_inner() {
                if let Ok(retrieval) = inner.downcast::<RetrievalError>() {
                    return *retrieval;
                }
            }
            return RetrievalError::BackendIo {
                tool: String::new(),
                file: PathBuf::new(),
                revision: String::new(),
                exit_code: None,
                stderr: String::new(),
                message: "stream error lost its context".to_string(),
            };
        }

        RetrievalError::BackendIo {
            tool: String::new(),
            file: PathBuf::new(),
            revision: String::new(),
            exit_code: None,
            stderr: String::new(),
            message: err.to_string(),
        }
    }

    /// Wrap into an `io::Error` so it can travel through `AsyncRead`
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            RetrievalError::RevisionNotFound { .. } => io::ErrorKind::NotFound,
            RetrievalError::BackendIo { message, .. } if message.starts_with("timed out") => {
                io::ErrorKind::TimedOut
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

/// Result type alias using RetrievalError
pub type Result<T> = std::result::Result<T, RetrievalError>;

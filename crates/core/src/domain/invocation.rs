// Tool Invocation - one external command, built per retrieval call

use crate::domain::{RevisionId, TrackedFile};
use crate::error::RetrievalError;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Description of a single backend tool run
///
/// Never persisted, never shared across calls.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    /// Overrides the runner's default timeout
    pub timeout: Option<Duration>,
    /// Lowercase stderr fragments meaning "no such revision" for this backend
    pub missing_revision_markers: Vec<String>,
    pub file: PathBuf,
    pub revision: RevisionId,
}

impl ToolInvocation {
    pub fn new(
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: HashMap::new(),
            timeout: None,
            missing_revision_markers: Vec::new(),
            file: file.path().to_path_buf(),
            revision: revision.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn missing_revision_markers(mut self, markers: &[&str]) -> Self {
        self.missing_revision_markers = markers.iter().map(|m| m.to_ascii_lowercase()).collect();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Spawn failure: missing or non-executable program is `ToolNotFound`
    pub fn spawn_error(&self, err: io::Error) -> RetrievalError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                RetrievalError::ToolNotFound {
                    tool: self.program.clone(),
                    source: err,
                }
            }
            _ => self.io_error("spawn failed", err),
        }
    }

    pub fn io_error(&self, context: &str, err: io::Error) -> RetrievalError {
        RetrievalError::BackendIo {
            tool: self.program.clone(),
            file: self.file.clone(),
            revision: self.revision.to_string(),
            exit_code: None,
            stderr: String::new(),
            message: format!("{}: {}", context, err),
        }
    }

    pub fn timeout_error(&self, after: Duration, stderr: String) -> RetrievalError {
        RetrievalError::BackendIo {
            tool: self.program.clone(),
            file: self.file.clone(),
            revision: self.revision.to_string(),
            exit_code: None,
            stderr,
            message: format!("timed out after {}ms", after.as_millis()),
        }
    }

    /// Classify a non-zero exit using this backend's markers
    pub fn exit_error(&self, exit_code: Option<i32>, stderr: String) -> RetrievalError {
        let lowered = stderr.to_ascii_lowercase();
        let missing = self
            .missing_revision_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()));

        if missing {
            return RetrievalError::RevisionNotFound {
                file: self.file.clone(),
                revision: self.revision.to_string(),
                reason: stderr.trim().to_string(),
            };
        }

        let message = match exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        RetrievalError::BackendIo {
            tool: self.program.clone(),
            file: self.file.clone(),
            revision: self.revision.to_string(),
            exit_code,
            stderr,
            message,
        }
    }
}

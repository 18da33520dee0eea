// Subprocess runner implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tracing::info;

use revget_core::application::constants::{GRACEFUL_SHUTDOWN_TIMEOUT, STDERR_CAPTURE_LIMIT};
use revget_core::domain::ToolInvocation;
use revget_core::port::{ProcessRunner, RevisionStream, TimeProvider};
use revget_core::{Result, RetrievalError};

use crate::process_stream::{ProcessStream, StderrCapture};

/// Subprocess runner
/// Spawns one child per invocation: stdin closed, stdout streamed, stderr drained
pub struct SubprocessRunner {
    time_provider: Arc<dyn TimeProvider>,
    default_timeout: Option<Duration>,
    kill_grace: Duration,
    stderr_limit: usize,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(Arc::new(SystemTimeProvider))
    ///     .with_timeout(Some(Duration::from_secs(60)));
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            default_timeout: None,
            kill_grace: GRACEFUL_SHUTDOWN_TIMEOUT,
            stderr_limit: STDERR_CAPTURE_LIMIT,
        }
    }

    /// Bound every run, unless the invocation carries its own timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Time allowed between SIGTERM and SIGKILL when a stream is closed early
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    /// Spawn the tool and return its primed stdout stream
    ///
    /// Exposed for callers that need the concrete stream (e.g. its process id).
    pub async fn spawn_stream(&self, invocation: ToolInvocation) -> Result<ProcessStream> {
        check_working_dir(&invocation).await?;

        let started_ms = self.time_provider.now_millis();
        let time_limit = invocation.timeout.or(self.default_timeout);

        info!(
            command = %invocation.program,
            args = ?invocation.args,
            working_dir = %invocation.working_dir.display(),
            timeout_ms = ?time_limit.map(|t| t.as_millis()),
            "Starting tool"
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| invocation.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| invocation.io_error("stdout", io::Error::other("not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| invocation.io_error("stderr", io::Error::other("not captured")))?;
        let captured = StderrCapture::new(self.stderr_limit);
        let stderr_task = tokio::spawn(drain_stderr(stderr, captured.clone()));

        let mut stream = ProcessStream::new(
            invocation,
            child,
            stdout,
            stderr_task,
            captured,
            time_limit,
            self.kill_grace,
            self.time_provider.clone(),
            started_ms,
        );
        stream.prime().await?;
        Ok(stream)
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn stream(&self, invocation: ToolInvocation) -> Result<RevisionStream> {
        let stream = self.spawn_stream(invocation).await?;
        Ok(Box::new(stream))
    }

    async fn run(&self, invocation: ToolInvocation) -> Result<()> {
        let mut stream = self.spawn_stream(invocation).await?;
        tokio::io::copy(&mut stream, &mut tokio::io::sink())
            .await
            .map_err(RetrievalError::from_io)?;
        Ok(())
    }
}

/// A missing working directory must not be mistaken for a missing tool
async fn check_working_dir(invocation: &ToolInvocation) -> Result<()> {
    match tokio::fs::metadata(&invocation.working_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(invocation.io_error(
            "working directory",
            io::Error::other(format!("{} is not a directory", invocation.working_dir.display())),
        )),
        Err(e) => Err(invocation.io_error("working directory", e)),
    }
}

/// Read stderr to its end, keeping what fits in `captured` and discarding the rest
async fn drain_stderr(mut stderr: ChildStderr, captured: Arc<StderrCapture>) {
    let mut chunk = [0u8; 4096];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => captured.push(&chunk[..n]),
        }
    }
}

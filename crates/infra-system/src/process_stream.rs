// Process stream: stdout of a running tool, exit status checked at EOF
// reason: futures BoxFuture to poll the deferred exit wait from poll_read
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use revget_core::application::constants::PRIME_CHUNK_SIZE;
use revget_core::domain::ToolInvocation;
use revget_core::port::{RevisionContent, TimeProvider};
use revget_core::{Result, RetrievalError};

/// First bytes of a tool's stderr, shared between the drain task and the stream
///
/// Readable at any time, so a timed out tool still reports what it had printed.
#[derive(Debug)]
pub(crate) struct StderrCapture {
    kept: Mutex<Vec<u8>>,
    limit: usize,
}

impl StderrCapture {
    pub(crate) fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            kept: Mutex::new(Vec::new()),
            limit,
        })
    }

    /// Keep as much of `chunk` as still fits under the limit
    pub(crate) fn push(&self, chunk: &[u8]) {
        let mut kept = self.kept.lock().unwrap_or_else(|e| e.into_inner());
        let room = self.limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub(crate) fn contents(&self) -> String {
        let kept = self.kept.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&kept).into_owned()
    }
}

/// Stdout of one tool run
///
/// The child is waited for only after stdout reaches EOF, so output larger than
/// the pipe buffer never deadlocks. A non-zero exit is reported by the read that
/// would otherwise have returned EOF.
pub struct ProcessStream {
    invocation: ToolInvocation,
    stdout: ChildStdout,
    child: Option<Child>,
    stderr_task: Option<JoinHandle<()>>,
    stderr: Arc<StderrCapture>,
    primed: Vec<u8>,
    primed_pos: usize,
    deadline: Option<(Duration, Pin<Box<Sleep>>)>,
    finishing: Option<BoxFuture<'static, Result<()>>>,
    done: bool,
    kill_grace: Duration,
    time_provider: Arc<dyn TimeProvider>,
    started_ms: i64,
}

impl ProcessStream {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        invocation: ToolInvocation,
        child: Child,
        stdout: ChildStdout,
        stderr_task: JoinHandle<()>,
        stderr: Arc<StderrCapture>,
        time_limit: Option<Duration>,
        kill_grace: Duration,
        time_provider: Arc<dyn TimeProvider>,
        started_ms: i64,
    ) -> Self {
        Self {
            invocation,
            stdout,
            child: Some(child),
            stderr_task: Some(stderr_task),
            stderr,
            primed: Vec::new(),
            primed_pos: 0,
            deadline: time_limit.map(|limit| (limit, Box::pin(tokio::time::sleep(limit)))),
            finishing: None,
            done: false,
            kill_grace,
            time_provider,
            started_ms,
        }
    }

    /// OS process id while the tool is still owned by this stream
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    /// Read the first chunk so that early failures surface before the stream is handed out
    pub(crate) async fn prime(&mut self) -> Result<()> {
        let mut first = vec![0u8; PRIME_CHUNK_SIZE];
        let n = self.read(&mut first).await.map_err(RetrievalError::from_io)?;
        first.truncate(n);
        self.primed = first;
        self.primed_pos = 0;
        Ok(())
    }

    /// Build the deferred exit check: wait for the child, collect stderr, classify
    fn finish(&mut self) -> BoxFuture<'static, Result<()>> {
        let child = self.child.take();
        let stderr_task = self.stderr_task.take();
        let captured = self.stderr.clone();
        let invocation = self.invocation.clone();
        let time_provider = self.time_provider.clone();
        let started_ms = self.started_ms;

        async move {
            let Some(mut child) = child else {
                return Ok(());
            };
            let status = child
                .wait()
                .await
                .map_err(|e| invocation.io_error("waiting for exit", e))?;
            if let Some(task) = stderr_task {
                // the pipe closes with the tool, so this ends promptly
                let _ = task.await;
            }
            let stderr = captured.contents();
            let duration_ms = time_provider.elapsed_millis(started_ms);

            if status.success() {
                if !stderr.is_empty() {
                    debug!(tool = %invocation.program, stderr = %stderr.trim_end(), "Tool stderr");
                }
                info!(
                    tool = %invocation.program,
                    file = %invocation.file.display(),
                    revision = %invocation.revision,
                    duration_ms = %duration_ms,
                    "Tool completed"
                );
                return Ok(());
            }

            let err = invocation.exit_error(status.code(), stderr);
            warn!(
                tool = %invocation.program,
                file = %invocation.file.display(),
                revision = %invocation.revision,
                duration_ms = %duration_ms,
                exit_code = ?status.code(),
                error = %err,
                "Tool failed"
            );
            Err(err)
        }
        .boxed()
    }

    /// Deadline passed: kill the tool and report a timeout
    fn fail_timeout(&mut self, after: Duration) -> RetrievalError {
        self.done = true;
        self.deadline = None;
        // dropping a pending exit wait drops its Child, which kills it (kill_on_drop)
        self.finishing = None;
        self.stderr_task = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(tool = %self.invocation.program, error = %e, "Failed to kill timed out tool");
            }
        }
        let stderr = self.stderr.contents();
        warn!(
            tool = %self.invocation.program,
            file = %self.invocation.file.display(),
            revision = %self.invocation.revision,
            timeout_ms = %after.as_millis(),
            stderr = %stderr.trim_end(),
            "Tool timed out"
        );
        self.invocation.timeout_error(after, stderr)
    }

    fn fail_read(&mut self, err: io::Error) -> RetrievalError {
        self.done = true;
        self.deadline = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        self.invocation.io_error("reading stdout", err)
    }
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if this.primed_pos < this.primed.len() {
            let n = (this.primed.len() - this.primed_pos).min(buf.remaining());
            buf.put_slice(&this.primed[this.primed_pos..this.primed_pos + n]);
            this.primed_pos += n;
            return Poll::Ready(Ok(()));
        }

        if this.done {
            return Poll::Ready(Ok(()));
        }

        if let Some((limit, sleep)) = this.deadline.as_mut() {
            if sleep.as_mut().poll(cx).is_ready() {
                let limit = *limit;
                return Poll::Ready(Err(this.fail_timeout(limit).into_io()));
            }
        }

        if this.finishing.is_none() {
            let before = buf.filled().len();
            match Pin::new(&mut this.stdout).poll_read(cx, buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(this.fail_read(e).into_io())),
                Poll::Ready(Ok(())) => {
                    if buf.filled().len() > before {
                        return Poll::Ready(Ok(()));
                    }
                    // EOF on stdout: only now is it safe to wait for the exit status
                    this.finishing = Some(this.finish());
                }
            }
        }

        let outcome = match this.finishing.as_mut() {
            Some(exit) => match exit.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(outcome) => outcome,
            },
            None => Ok(()),
        };

        this.finishing = None;
        this.deadline = None;
        this.done = true;

        match outcome {
            Ok(()) => Poll::Ready(Ok(())),
            Err(e) => Poll::Ready(Err(e.into_io())),
        }
    }
}

#[async_trait]
impl RevisionContent for ProcessStream {
    async fn close(mut self: Box<Self>) -> Result<()> {
        self.done = true;
        self.deadline = None;
        self.finishing = None;

        match self.child.take() {
            Some(child) => terminate(child, self.kill_grace, &self.invocation).await,
            None => Ok(()),
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if !self.done && self.child.is_some() {
            debug!(
                tool = %self.invocation.program,
                revision = %self.invocation.revision,
                "Stream dropped before EOF, killing tool"
            );
        }
    }
}

/// Kill with SIGTERM first, then SIGKILL if the tool ignores it
async fn terminate(mut child: Child, grace: Duration, invocation: &ToolInvocation) -> Result<()> {
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        use tokio::time::timeout;

        if let Some(pid) = child.id() {
            debug!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                match timeout(grace, child.wait()).await {
                    Ok(waited) => {
                        return waited
                            .map(|_| ())
                            .map_err(|e| invocation.io_error("waiting for exit", e));
                    }
                    Err(_) => {
                        warn!(pid = %pid, "Tool did not exit after SIGTERM, sending SIGKILL");
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child
        .kill()
        .await
        .map_err(|e| invocation.io_error("kill failed", e))
}

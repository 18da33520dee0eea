// Process Runner Port
// Isolates process-spawning mechanics from backend knowledge

use crate::domain::ToolInvocation;
use crate::error::Result;
use crate::port::revision_retriever::RevisionStream;
use async_trait::async_trait;

/// Process Runner trait
///
/// Implementations:
/// - SubprocessRunner: tokio child process, stdout streamed
/// - RecordingRunner: captures invocations (tests)
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn the tool and stream its stdout
    ///
    /// Returns once output is available or the tool has exited, so a tool that
    /// fails before writing anything fails this call.
    ///
    /// # Errors
    /// - RetrievalError::ToolNotFound if the program cannot be started
    /// - RetrievalError::RevisionNotFound if stderr matches a missing-revision marker
    /// - RetrievalError::BackendIo for other non-zero exits, I/O failures and timeouts
    async fn stream(&self, invocation: ToolInvocation) -> Result<RevisionStream>;

    /// Run the tool to completion, discarding stdout
    ///
    /// # Errors
    /// Same classification as `stream`
    async fn run(&self, invocation: ToolInvocation) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::revision_retriever::mocks::InMemoryContent;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum RunnerBehavior {
        /// Exit 0 with this stdout
        Output(Vec<u8>),
        /// Exit with this code and stderr, classified by the invocation's markers
        Exit(i32, String),
        /// Program missing
        ToolMissing,
    }

    /// Records every invocation it is handed
    pub struct RecordingRunner {
        behavior: RunnerBehavior,
        invocations: Arc<Mutex<Vec<ToolInvocation>>>,
    }

    impl RecordingRunner {
        pub fn new(behavior: RunnerBehavior) -> Self {
            Self {
                behavior,
                invocations: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_output(content: impl Into<Vec<u8>>) -> Self {
            Self::new(RunnerBehavior::Output(content.into()))
        }

        pub fn invocations(&self) -> Vec<ToolInvocation> {
            self.invocations.lock().unwrap().clone()
        }

        fn record(&self, invocation: &ToolInvocation) -> Result<Vec<u8>> {
            self.invocations.lock().unwrap().push(invocation.clone());
            match &self.behavior {
                RunnerBehavior::Output(content) => Ok(content.clone()),
                RunnerBehavior::Exit(code, stderr) => {
                    Err(invocation.exit_error(Some(*code), stderr.clone()))
                }
                RunnerBehavior::ToolMissing => Err(invocation
                    .spawn_error(std::io::Error::from(std::io::ErrorKind::NotFound))),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn stream(&self, invocation: ToolInvocation) -> Result<RevisionStream> {
            let content = self.record(&invocation)?;
            Ok(Box::new(InMemoryContent::new(content)))
        }

        async fn run(&self, invocation: ToolInvocation) -> Result<()> {
            self.record(&invocation).map(|_| ())
        }
    }
}

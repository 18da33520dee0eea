// Revision Retriever Port
// The one contract every backend adapter implements

use crate::domain::{RepositoryType, RevisionId, TrackedFile};
use crate::error::{Result, RetrievalError};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Forward-only content of one revision
///
/// Reading to EOF releases the producer (process, scratch space). Dropping early
/// also releases it; `close()` does the same but waits for termination.
#[async_trait]
pub trait RevisionContent: AsyncRead + Send + Unpin {
    /// Stop producing, terminate the producer and reclaim its resources
    ///
    /// # Errors
    /// - RetrievalError::BackendIo if the producer could not be terminated
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Stream handed back to callers of `get_revision`
pub type RevisionStream = Box<dyn RevisionContent>;

/// Revision Retriever trait
///
/// Implementations:
/// - SccsRetriever: `get -p` print mode
/// - RcsRetriever, MercurialRetriever: print-to-stdout tools
/// - ClearCaseRetriever: materializes into scratch space
#[async_trait]
pub trait RevisionRetriever: Send + Sync {
    /// Backend this retriever serves
    fn repository_type(&self) -> RepositoryType;

    /// Stream the content of `file` at `revision` using the tool at `tool`
    ///
    /// Returns once the stream is ready to read; content is not pre-read.
    ///
    /// # Errors
    /// - RetrievalError::ToolNotFound if the executable cannot be started
    /// - RetrievalError::RevisionNotFound if the revision or history file is absent
    /// - RetrievalError::BackendIo if the tool fails otherwise
    /// - RetrievalError::Resource if scratch space cannot be created
    async fn get_revision(
        &self,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream>;
}

/// Drain a stream completely, surfacing the typed error on failure
pub async fn read_to_end(mut stream: RevisionStream) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    stream
        .read_to_end(&mut content)
        .await
        .map_err(RetrievalError::from_io)?;
    Ok(content)
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// In-memory revision content
    pub struct InMemoryContent {
        reader: Cursor<Vec<u8>>,
        closed: Arc<AtomicUsize>,
    }

    impl InMemoryContent {
        pub fn new(content: Vec<u8>) -> Self {
            Self::with_close_counter(content, Arc::new(AtomicUsize::new(0)))
        }

        pub fn with_close_counter(content: Vec<u8>, closed: Arc<AtomicUsize>) -> Self {
            Self {
                reader: Cursor::new(content),
                closed,
            }
        }
    }

    impl AsyncRead for InMemoryContent {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.reader).poll_read(cx, buf)
        }
    }

    #[async_trait]
    impl RevisionContent for InMemoryContent {
        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Mock Retriever serving a fixed revision table
    pub struct MockRetriever {
        repository_type: RepositoryType,
        revisions: HashMap<String, Vec<u8>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockRetriever {
        pub fn new(repository_type: RepositoryType) -> Self {
            Self {
                repository_type,
                revisions: HashMap::new(),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn with_revision(mut self, revision: &str, content: impl Into<Vec<u8>>) -> Self {
            self.revisions.insert(revision.to_string(), content.into());
            self
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl RevisionRetriever for MockRetriever {
        fn repository_type(&self) -> RepositoryType {
            self.repository_type
        }

        async fn get_revision(
            &self,
            _tool: &str,
            file: &TrackedFile,
            revision: &RevisionId,
        ) -> Result<RevisionStream> {
            *self.call_count.lock().unwrap() += 1;

            match self.revisions.get(revision.as_str()) {
                Some(content) => Ok(Box::new(InMemoryContent::new(content.clone()))),
                None => Err(RetrievalError::RevisionNotFound {
                    file: file.path().to_path_buf(),
                    revision: revision.to_string(),
                    reason: "mock has no such revision".to_string(),
                }),
            }
        }
    }
}

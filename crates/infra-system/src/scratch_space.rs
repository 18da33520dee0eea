// Scratch space implementation
// reason: tokio::fs so creating and removing directories never blocks a runtime worker
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, warn};

use revget_core::application::constants::{DEFAULT_SCRATCH_DIR_NAME, SCRATCH_CREATE_ATTEMPTS};
use revget_core::domain::ScratchDirectory;
use revget_core::port::{IdProvider, RevisionContent, ScratchSpace};
use revget_core::{Result, RetrievalError};

/// Scratch directories under a shared root, named `<label>-<id>`
///
/// The leaf is created with `create_dir`, so two calls can never share one.
pub struct TempScratchSpace {
    root: PathBuf,
    id_provider: Arc<dyn IdProvider>,
}

impl TempScratchSpace {
    pub fn new(root: impl Into<PathBuf>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            root: root.into(),
            id_provider,
        }
    }

    /// Root under the system temp directory
    pub fn in_temp_dir(id_provider: Arc<dyn IdProvider>) -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME), id_provider)
    }
}

#[async_trait]
impl ScratchSpace for TempScratchSpace {
    async fn acquire(&self, label: &str) -> Result<ScratchDirectory> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RetrievalError::Resource {
                path: self.root.clone(),
                source: e,
            })?;

        let label = sanitize_label(label);
        let mut last_collision = None;

        for _ in 0..SCRATCH_CREATE_ATTEMPTS {
            let path = self
                .root
                .join(format!("{}-{}", label, self.id_provider.generate_id()));

            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Scratch directory created");
                    return Ok(ScratchDirectory::adopt(path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(path = %path.display(), "Scratch directory name collision, retrying");
                    last_collision = Some((path, e));
                }
                Err(e) => return Err(RetrievalError::Resource { path, source: e }),
            }
        }

        let (path, source) = last_collision.unwrap_or_else(|| {
            (
                self.root.clone(),
                io::Error::other("no scratch directory attempts configured"),
            )
        });
        Err(RetrievalError::Resource { path, source })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "scratch".to_string()
    } else {
        cleaned
    }
}

/// Content materialized into a scratch directory
///
/// Owns the directory: it is removed at EOF, on `close()`, or on drop,
/// whichever comes first. Only the drop path removes synchronously.
pub struct ScratchFileStream {
    file: File,
    scratch: Option<ScratchDirectory>,
    releasing: Option<BoxFuture<'static, ()>>,
}

impl ScratchFileStream {
    pub fn new(file: File, scratch: ScratchDirectory) -> Self {
        Self {
            file,
            scratch: Some(scratch),
            releasing: None,
        }
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|s| s.path())
    }
}

/// Removal of a scratch directory; failure is logged, never returned
fn release_scratch(scratch: ScratchDirectory) -> BoxFuture<'static, ()> {
    async move {
        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.release().await {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
    .boxed()
}

impl AsyncRead for ScratchFileStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.releasing.is_none() {
            let before = buf.filled().len();
            let wanted = buf.remaining() > 0;

            match Pin::new(&mut this.file).poll_read(cx, buf) {
                Poll::Ready(Ok(())) if wanted && buf.filled().len() == before => {
                    // EOF: nothing more will be read, so the directory can go
                    match this.scratch.take() {
                        Some(scratch) => this.releasing = Some(release_scratch(scratch)),
                        None => return Poll::Ready(Ok(())),
                    }
                }
                other => return other,
            }
        }

        // EOF is reported only once the directory is gone
        match this.releasing.as_mut() {
            Some(releasing) => match releasing.as_mut().poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(()) => {
                    this.releasing = None;
                    Poll::Ready(Ok(()))
                }
            },
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl RevisionContent for ScratchFileStream {
    async fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(releasing) = self.releasing.take() {
            releasing.await;
        }
        if let Some(scratch) = self.scratch.take() {
            release_scratch(scratch).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revget_core::port::id_provider::UuidProvider;
    use revget_core::port::read_to_end;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    /// Always hands out the same id
    struct FixedIdProvider;

    impl IdProvider for FixedIdProvider {
        fn generate_id(&self) -> String {
            "fixed".to_string()
        }
    }

    /// Collides once, then counts up
    struct CollidingOnceProvider {
        next: AtomicUsize,
    }

    impl IdProvider for CollidingOnceProvider {
        fn generate_id(&self) -> String {
            match self.next.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => "dup".to_string(),
                n => format!("id{}", n),
            }
        }
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).map(|rd| rd.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_acquire_creates_root_and_leaf() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("scratch");
        let space = TempScratchSpace::new(&root, Arc::new(UuidProvider));

        let scratch = space.acquire("clearcase").await.unwrap();

        assert!(scratch.path().is_dir());
        assert!(scratch.path().starts_with(&root));
        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("clearcase-"));

        scratch.release().await.unwrap();
        assert_eq!(entries(&root), 0);
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let tmp = TempDir::new().unwrap();
        let space = TempScratchSpace::new(
            tmp.path(),
            Arc::new(CollidingOnceProvider {
                next: AtomicUsize::new(0),
            }),
        );

        let first = space.acquire("x").await.unwrap();
        let second = space.acquire("x").await.unwrap();

        assert_ne!(first.path(), second.path());
    }

    #[tokio::test]
    async fn test_persistent_collision_is_resource_error() {
        let tmp = TempDir::new().unwrap();
        let space = TempScratchSpace::new(tmp.path(), Arc::new(FixedIdProvider));

        let _held = space.acquire("x").await.unwrap();
        let err = space.acquire("x").await.unwrap_err();

        assert!(matches!(err, RetrievalError::Resource { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_root_is_resource_error() {
        let space = TempScratchSpace::new("/proc/revget-scratch", Arc::new(UuidProvider));
        let err = space.acquire("x").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Resource { .. }));
    }

    #[test]
    fn test_label_is_sanitized() {
        assert_eq!(sanitize_label("../etc"), "___etc");
        assert_eq!(sanitize_label(""), "scratch");
        assert_eq!(sanitize_label("hg-cat_1"), "hg-cat_1");
    }

    #[tokio::test]
    async fn test_concurrent_acquire_never_collides() {
        let tmp = TempDir::new().unwrap();
        let space = Arc::new(TempScratchSpace::new(tmp.path(), Arc::new(UuidProvider)));

        let mut tasks = JoinSet::new();
        for _ in 0..64 {
            let space = space.clone();
            tasks.spawn(async move { space.acquire("c").await.unwrap() });
        }

        let mut held = Vec::new();
        while let Some(result) = tasks.join_next().await {
            held.push(result.unwrap());
        }
        assert_eq!(entries(tmp.path()), 64);

        drop(held);
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_file_stream_releases_scratch_at_eof() {
        let tmp = TempDir::new().unwrap();
        let space = TempScratchSpace::new(tmp.path(), Arc::new(UuidProvider));
        let scratch = space.acquire("c").await.unwrap();
        let content_path = scratch.path().join("note.txt");
        std::fs::write(&content_path, b"materialized\n").unwrap();

        let file = File::open(&content_path).await.unwrap();
        let stream = ScratchFileStream::new(file, scratch);

        assert_eq!(read_to_end(Box::new(stream)).await.unwrap(), b"materialized\n");
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_file_stream_close_before_eof() {
        let tmp = TempDir::new().unwrap();
        let space = TempScratchSpace::new(tmp.path(), Arc::new(UuidProvider));
        let scratch = space.acquire("c").await.unwrap();
        let content_path = scratch.path().join("note.txt");
        std::fs::write(&content_path, vec![b'x'; 100_000]).unwrap();

        let file = File::open(&content_path).await.unwrap();
        let stream = Box::new(ScratchFileStream::new(file, scratch));
        assert!(stream.scratch_path().is_some());

        stream.close().await.unwrap();
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_file_stream_reads_after_eof_stay_empty() {
        use tokio::io::AsyncReadExt;

        let tmp = TempDir::new().unwrap();
        let space = TempScratchSpace::new(tmp.path(), Arc::new(UuidProvider));
        let scratch = space.acquire("c").await.unwrap();
        let content_path = scratch.path().join("note.txt");
        std::fs::write(&content_path, b"once\n").unwrap();

        let file = File::open(&content_path).await.unwrap();
        let mut stream = ScratchFileStream::new(file, scratch);

        let mut content = Vec::new();
        stream.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"once\n");
        assert!(stream.scratch_path().is_none());
        assert_eq!(entries(tmp.path()), 0);

        let mut more = [0u8; 8];
        assert_eq!(stream.read(&mut more).await.unwrap(), 0);
    }
}

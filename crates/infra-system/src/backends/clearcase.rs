// ClearCase retriever
// cleartool writes the revision to a file, so it goes through a scratch directory
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use revget_core::domain::{RepositoryType, RevisionId, ToolInvocation, TrackedFile};
use revget_core::port::{ProcessRunner, RevisionRetriever, RevisionStream, ScratchSpace};
use revget_core::{Result, RetrievalError};

use super::path_operand;
use crate::scratch_space::ScratchFileStream;

pub const CLEARCASE_MISSING_REVISION_MARKERS: &[&str] =
    &["unable to access", "not a vob object", "no such file"];

const VERSION_SEPARATOR: &str = "@@";

/// Revision retriever for ClearCase views (`cleartool get -to`)
pub struct ClearCaseRetriever {
    runner: Arc<dyn ProcessRunner>,
    scratch: Arc<dyn ScratchSpace>,
}

impl ClearCaseRetriever {
    pub fn new(runner: Arc<dyn ProcessRunner>, scratch: Arc<dyn ScratchSpace>) -> Self {
        Self { runner, scratch }
    }

    /// `<tool> get -to <dest> <name>@@<revision>` run in the file's directory
    pub fn build_invocation(
        tool: &str,
        dest: &Path,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> ToolInvocation {
        ToolInvocation::new(tool, file.directory(), file, revision)
            .arg("get")
            .arg("-to")
            .arg(dest.to_string_lossy())
            .arg(format!(
                "{}{}{}",
                path_operand(&file.base_name()),
                VERSION_SEPARATOR,
                revision
            ))
            .missing_revision_markers(CLEARCASE_MISSING_REVISION_MARKERS)
    }
}

#[async_trait]
impl RevisionRetriever for ClearCaseRetriever {
    fn repository_type(&self) -> RepositoryType {
        RepositoryType::ClearCase
    }

    async fn get_revision(
        &self,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        revision.validate(file)?;

        // dropped on every early return below, which removes the directory
        let scratch = self.scratch.acquire(RepositoryType::ClearCase.as_str()).await?;
        let dest = scratch.path().join(file.base_name());

        let invocation = Self::build_invocation(tool, &dest, file, revision);
        let missing_output = invocation.io_error(
            "no output file",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        self.runner.run(invocation).await?;

        let content = match tokio::fs::File::open(&dest).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing_output),
            Err(e) => {
                return Err(RetrievalError::Resource {
                    path: dest,
                    source: e,
                })
            }
        };

        debug!(path = %dest.display(), "Serving materialized revision");
        Ok(Box::new(ScratchFileStream::new(content, scratch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch_space::TempScratchSpace;
    use revget_core::port::id_provider::UuidProvider;
    use revget_core::port::process_runner::mocks::{RecordingRunner, RunnerBehavior};
    use revget_core::port::read_to_end;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes fixed content to the `-to` destination, like cleartool
    struct MaterializingRunner {
        content: Vec<u8>,
        invocations: Mutex<Vec<ToolInvocation>>,
    }

    impl MaterializingRunner {
        fn new(content: &str) -> Self {
            Self {
                content: content.as_bytes().to_vec(),
                invocations: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for MaterializingRunner {
        async fn stream(&self, _invocation: ToolInvocation) -> Result<RevisionStream> {
            unreachable!("cleartool output is never streamed")
        }

        async fn run(&self, invocation: ToolInvocation) -> Result<()> {
            std::fs::write(&invocation.args[2], &self.content).unwrap();
            self.invocations.lock().unwrap().push(invocation);
            Ok(())
        }
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).map(|rd| rd.count()).unwrap_or(0)
    }

    fn setup() -> (TempDir, TempDir, Arc<TempScratchSpace>) {
        let view = TempDir::new().unwrap();
        let scratch_root = TempDir::new().unwrap();
        let space = Arc::new(TempScratchSpace::new(
            scratch_root.path(),
            Arc::new(UuidProvider),
        ));
        (view, scratch_root, space)
    }

    #[tokio::test]
    async fn test_materialized_content_is_streamed_then_removed() {
        let (view, scratch_root, space) = setup();
        let runner = Arc::new(MaterializingRunner::new("version two\n"));
        let retriever = ClearCaseRetriever::new(runner.clone(), space);
        let file = TrackedFile::new(view.path().join("design.txt"));

        let stream = retriever
            .get_revision("cleartool", &file, &RevisionId::new("/main/2"))
            .await
            .unwrap();
        assert_eq!(entries(scratch_root.path()), 1);

        assert_eq!(read_to_end(stream).await.unwrap(), b"version two\n");
        assert_eq!(entries(scratch_root.path()), 0);

        let invocations = runner.invocations.lock().unwrap();
        let inv = &invocations[0];
        assert_eq!(inv.args[0], "get");
        assert_eq!(inv.args[1], "-to");
        assert!(Path::new(&inv.args[2]).starts_with(scratch_root.path()));
        assert_eq!(inv.args[3], "design.txt@@/main/2");
        assert_eq!(inv.working_dir, view.path());
        // the view itself is untouched
        assert_eq!(entries(view.path()), 0);
    }

    #[tokio::test]
    async fn test_failure_removes_scratch() {
        let (view, scratch_root, space) = setup();
        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::Exit(
            1,
            "cleartool: Error: Unable to access \"design.txt@@/main/9\": No such file or directory."
                .to_string(),
        )));
        let retriever = ClearCaseRetriever::new(runner, space);

        let err = retriever
            .get_revision(
                "cleartool",
                &TrackedFile::new(view.path().join("design.txt")),
                &RevisionId::new("/main/9"),
            )
            .await
            .err()
            .unwrap();

        assert!(err.is_revision_not_found());
        assert_eq!(entries(scratch_root.path()), 0);
    }

    #[tokio::test]
    async fn test_success_without_output_file_is_backend_io() {
        let (view, scratch_root, space) = setup();
        let runner = Arc::new(RecordingRunner::with_output(""));
        let retriever = ClearCaseRetriever::new(runner, space);

        let err = retriever
            .get_revision(
                "cleartool",
                &TrackedFile::new(view.path().join("design.txt")),
                &RevisionId::new("/main/1"),
            )
            .await
            .err()
            .unwrap();

        assert!(matches!(err, RetrievalError::BackendIo { .. }));
        assert_eq!(entries(scratch_root.path()), 0);
    }

    #[tokio::test]
    async fn test_close_before_eof_removes_scratch() {
        let (view, scratch_root, space) = setup();
        let runner = Arc::new(MaterializingRunner::new(&"x".repeat(50_000)));
        let retriever = ClearCaseRetriever::new(runner, space);

        let stream = retriever
            .get_revision(
                "cleartool",
                &TrackedFile::new(view.path().join("design.txt")),
                &RevisionId::new("/main/1"),
            )
            .await
            .unwrap();
        stream.close().await.unwrap();

        assert_eq!(entries(scratch_root.path()), 0);
    }

    #[tokio::test]
    async fn test_dash_prefixed_name_is_not_an_option() {
        let (view, _scratch_root, space) = setup();
        let runner = Arc::new(MaterializingRunner::new("dashed\n"));
        let retriever = ClearCaseRetriever::new(runner.clone(), space);

        let stream = retriever
            .get_revision(
                "cleartool",
                &TrackedFile::new(view.path().join("-rm.txt")),
                &RevisionId::new("/main/1"),
            )
            .await
            .unwrap();
        assert_eq!(read_to_end(stream).await.unwrap(), b"dashed\n");

        let invocations = runner.invocations.lock().unwrap();
        assert_eq!(invocations[0].args[3], "./-rm.txt@@/main/1");
    }
}

// Mercurial retriever
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use revget_core::domain::{RepositoryType, RevisionId, ToolInvocation, TrackedFile};
use revget_core::port::{ProcessRunner, RevisionRetriever, RevisionStream};
use revget_core::{Result, RetrievalError};

pub const HG_MISSING_REVISION_MARKERS: &[&str] = &[
    "unknown revision",
    "no such file in rev",
    "ambiguous identifier",
];

const REPOSITORY_MARKER: &str = ".hg";

/// Revision retriever for Mercurial working copies (`hg cat -r`)
pub struct MercurialRetriever {
    runner: Arc<dyn ProcessRunner>,
}

impl MercurialRetriever {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn build_invocation(tool: &str, file: &TrackedFile, revision: &RevisionId) -> ToolInvocation {
        ToolInvocation::new(tool, file.directory(), file, revision)
            // plain output: no localization, no user aliases or defaults
            .env("HGPLAIN", "1")
            .arg("cat")
            .arg("-r")
            .arg(revision.as_str())
            .arg("--")
            .arg(file.base_name())
            .missing_revision_markers(HG_MISSING_REVISION_MARKERS)
    }
}

/// Closest ancestor directory holding a `.hg` directory
async fn find_repository_root(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if let Ok(meta) = tokio::fs::metadata(dir.join(REPOSITORY_MARKER)).await {
            if meta.is_dir() {
                return Some(dir.to_path_buf());
            }
        }
    }
    None
}

#[async_trait]
impl RevisionRetriever for MercurialRetriever {
    fn repository_type(&self) -> RepositoryType {
        RepositoryType::Mercurial
    }

    async fn get_revision(
        &self,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        revision.validate(file)?;

        if find_repository_root(file.directory()).await.is_none() {
            return Err(RetrievalError::RevisionNotFound {
                file: file.path().to_path_buf(),
                revision: revision.to_string(),
                reason: "not inside a Mercurial repository".to_string(),
            });
        }

        self.runner
            .stream(Self::build_invocation(tool, file, revision))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revget_core::port::process_runner::mocks::{RecordingRunner, RunnerBehavior};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_invocation_shape() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir(repo.path().join(".hg")).unwrap();
        std::fs::create_dir(repo.path().join("src")).unwrap();
        let file = TrackedFile::new(repo.path().join("src").join("lib.rs"));

        let runner = Arc::new(RecordingRunner::with_output("fn main() {}\n"));
        MercurialRetriever::new(runner.clone())
            .get_revision("hg", &file, &RevisionId::new("3f2a"))
            .await
            .unwrap();

        let inv = &runner.invocations()[0];
        assert_eq!(inv.args, vec!["cat", "-r", "3f2a", "--", "lib.rs"]);
        assert_eq!(inv.working_dir, repo.path().join("src"));
        assert_eq!(inv.env.get("HGPLAIN").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_outside_repository() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::with_output("unused"));

        let err = MercurialRetriever::new(runner.clone())
            .get_revision("hg", &TrackedFile::new(dir.path().join("a.txt")), &RevisionId::new("0"))
            .await
            .err()
            .unwrap();

        assert!(err.is_revision_not_found());
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_revision() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir(repo.path().join(".hg")).unwrap();

        let runner = Arc::new(RecordingRunner::new(RunnerBehavior::Exit(
            255,
            "abort: unknown revision 'deadbeef'!".to_string(),
        )));
        let err = MercurialRetriever::new(runner)
            .get_revision(
                "hg",
                &TrackedFile::new(repo.path().join("a.txt")),
                &RevisionId::new("deadbeef"),
            )
            .await
            .err()
            .unwrap();
        assert!(err.is_revision_not_found());
    }

    #[tokio::test]
    async fn test_dash_prefixed_name_is_not_an_option() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir(repo.path().join(".hg")).unwrap();
        let file = TrackedFile::new(repo.path().join("-v.txt"));

        let runner = Arc::new(RecordingRunner::with_output("verbose notes\n"));
        MercurialRetriever::new(runner.clone())
            .get_revision("hg", &file, &RevisionId::new("1"))
            .await
            .unwrap();

        let inv = &runner.invocations()[0];
        assert_eq!(inv.args, vec!["cat", "-r", "1", "--", "-v.txt"]);
    }
}

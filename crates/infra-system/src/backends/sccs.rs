// SCCS retriever
// `get -p` prints the requested delta to stdout, so the tracked directory is never touched
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use revget_core::domain::{RepositoryType, RevisionId, ToolInvocation, TrackedFile};
use revget_core::port::{ProcessRunner, RevisionRetriever, RevisionStream};
use revget_core::Result;

use super::{first_existing_file, missing_history, split_history};

/// stderr fragments meaning "no such delta"
///
/// Sun/Schily SCCS reports `nonexistent sid (ge5)`, CSSC reports `sid not found`.
/// Matched case-insensitively, only on a non-zero exit. Each names the SID, so a
/// shell's `command not found` stays a backend failure.
pub const SCCS_MISSING_REVISION_MARKERS: &[&str] =
    &["nonexistent sid", "(ge5)", "sid not found"];

const HISTORY_PREFIX: &str = "s.";
const HISTORY_SUBDIR: &str = "SCCS";

/// Revision retriever for SCCS histories (`s.<name>`)
pub struct SccsRetriever {
    runner: Arc<dyn ProcessRunner>,
}

impl SccsRetriever {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Where the history of `file` may live, in lookup order
    ///
    /// A file already named `s.*` is its own history; otherwise the sibling
    /// `s.<name>` is preferred over `SCCS/s.<name>`.
    pub fn history_candidates(file: &TrackedFile) -> Vec<PathBuf> {
        let name = file.base_name();
        if name.starts_with(HISTORY_PREFIX) {
            return vec![file.path().to_path_buf()];
        }
        vec![
            file.sibling(HISTORY_PREFIX, ""),
            file.directory()
                .join(HISTORY_SUBDIR)
                .join(format!("{}{}", HISTORY_PREFIX, name)),
        ]
    }

    /// `<tool> get -p -r<revision> <history name>` run beside the history file
    pub fn build_invocation(
        tool: &str,
        history: &Path,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> ToolInvocation {
        let (dir, name) = split_history(history);
        ToolInvocation::new(tool, dir, file, revision)
            .arg("get")
            .arg("-p")
            .arg(format!("-r{}", revision))
            .arg(name)
            .missing_revision_markers(SCCS_MISSING_REVISION_MARKERS)
    }
}

#[async_trait]
impl RevisionRetriever for SccsRetriever {
    fn repository_type(&self) -> RepositoryType {
        RepositoryType::Sccs
    }

    async fn get_revision(
        &self,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        revision.validate(file)?;

        let candidates = Self::history_candidates(file);
        let history = first_existing_file(&candidates)
            .await
            .ok_or_else(|| missing_history(file, revision, &candidates))?;

        let invocation = Self::build_invocation(tool, &history, file, revision);
        self.runner.stream(invocation).await
    }
}

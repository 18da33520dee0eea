// RCS retriever
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use revget_core::domain::{RepositoryType, RevisionId, ToolInvocation, TrackedFile};
use revget_core::port::{ProcessRunner, RevisionRetriever, RevisionStream};
use revget_core::Result;

use super::{first_existing_file, missing_history, path_operand, split_history};

pub const RCS_MISSING_REVISION_MARKERS: &[&str] = &["absent", "invalid revision", "no such file"];

const HISTORY_SUFFIX: &str = ",v";
const HISTORY_SUBDIR: &str = "RCS";

/// Revision retriever for RCS histories (`<name>,v`)
///
/// Uses `co -q -p<rev>`: content goes to stdout and no working file is checked out.
pub struct RcsRetriever {
    runner: Arc<dyn ProcessRunner>,
}

impl RcsRetriever {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn history_candidates(file: &TrackedFile) -> Vec<PathBuf> {
        let name = file.base_name();
        if name.ends_with(HISTORY_SUFFIX) {
            return vec![file.path().to_path_buf()];
        }
        vec![
            file.sibling("", HISTORY_SUFFIX),
            file.directory()
                .join(HISTORY_SUBDIR)
                .join(format!("{}{}", name, HISTORY_SUFFIX)),
        ]
    }

    pub fn build_invocation(
        tool: &str,
        history: &Path,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> ToolInvocation {
        let (dir, name) = split_history(history);
        ToolInvocation::new(tool, dir, file, revision)
            .arg("-q")
            .arg(format!("-p{}", revision))
            .arg(path_operand(&name))
            .missing_revision_markers(RCS_MISSING_REVISION_MARKERS)
    }
}

#[async_trait]
impl RevisionRetriever for RcsRetriever {
    fn repository_type(&self) -> RepositoryType {
        RepositoryType::Rcs
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

        self.runner
            .stream(Self::build_invocation(tool, &history, file, revision))
            .await
    }
}

// Backend adapters: one RevisionRetriever per version-control tool

pub mod clearcase;
pub mod mercurial;
pub mod rcs;
pub mod sccs;

pub use clearcase::ClearCaseRetriever;
pub use mercurial::MercurialRetriever;
pub use rcs::RcsRetriever;
pub use sccs::SccsRetriever;

use revget_core::domain::{RevisionId, TrackedFile};
use revget_core::RetrievalError;
use std::path::{Path, PathBuf};

/// First candidate that exists as a regular file
pub(crate) async fn first_existing_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    for candidate in candidates {
        if let Ok(meta) = tokio::fs::metadata(candidate).await {
            if meta.is_file() {
                return Some(candidate.clone());
            }
        }
    }
    None
}

pub(crate) fn missing_history(
    file: &TrackedFile,
    revision: &RevisionId,
    looked_at: &[PathBuf],
) -> RetrievalError {
    let looked_at: Vec<String> = looked_at
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    RetrievalError::RevisionNotFound {
        file: file.path().to_path_buf(),
        revision: revision.to_string(),
        reason: format!("no history file (looked for {})", looked_at.join(", ")),
    }
}

/// Operand for a file in the working directory that no tool can mistake for an option
pub(crate) fn path_operand(name: &str) -> String {
    if name.starts_with('-') {
        format!("./{}", name)
    } else {
        name.to_string()
    }
}

/// Split a history path into (directory, base name) for the tool invocation
pub(crate) fn split_history(history: &Path) -> (PathBuf, String) {
    let dir = history
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let name = history
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_operand() {
        assert_eq!(path_operand("main.c,v"), "main.c,v");
        assert_eq!(path_operand("-k.c,v"), "./-k.c,v");
        assert_eq!(path_operand("a-b.txt"), "a-b.txt");
    }
}

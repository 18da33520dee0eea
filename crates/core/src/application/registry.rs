// Backend Registry
// Immutable after build: lookups need no locking under concurrent retrieval

use crate::domain::{RepositoryType, RevisionId, TrackedFile};
use crate::error::{Result, RetrievalError};
use crate::port::{RevisionRetriever, RevisionStream};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps a repository type tag to its retriever
#[derive(Clone)]
pub struct BackendRegistry {
    retrievers: HashMap<RepositoryType, Arc<dyn RevisionRetriever>>,
}

impl BackendRegistry {
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// Find the retriever for a backend
    ///
    /// # Errors
    /// - RetrievalError::UnsupportedBackend if nothing is registered for `repository_type`
    pub fn lookup(&self, repository_type: RepositoryType) -> Result<Arc<dyn RevisionRetriever>> {
        self.retrievers
            .get(&repository_type)
            .cloned()
            .ok_or_else(|| RetrievalError::UnsupportedBackend(repository_type.to_string()))
    }

    /// Find the retriever for a textual tag such as `"SCCS"` or `"hg"`
    pub fn lookup_tag(&self, tag: &str) -> Result<Arc<dyn RevisionRetriever>> {
        let repository_type = tag
            .parse::<RepositoryType>()
            .map_err(RetrievalError::UnsupportedBackend)?;
        self.lookup(repository_type)
    }

    /// Registered backends in a stable order
    pub fn repository_types(&self) -> Vec<RepositoryType> {
        let mut types: Vec<RepositoryType> = self.retrievers.keys().copied().collect();
        types.sort_by_key(|ty| ty.as_str());
        types
    }

    /// Select the backend's retriever and fetch one revision
    ///
    /// # Example
    /// ```text
    /// let stream = registry
    ///     .get_revision(RepositoryType::Sccs, "sccs", &file, &RevisionId::new("1.2"))
    ///     .await?;
    /// ```
    pub async fn get_revision(
        &self,
        repository_type: RepositoryType,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        let retriever = self.lookup(repository_type)?;
        revision.validate(file)?;

        debug!(
            backend = %repository_type,
            tool = %tool,
            file = %file.path().display(),
            revision = %revision,
            "Retrieving revision"
        );

        retriever
            .get_revision(tool, file, revision)
            .await
            .inspect_err(|e| {
                warn!(
                    backend = %repository_type,
                    file = %file.path().display(),
                    revision = %revision,
                    error = %e,
                    "Revision retrieval failed"
                )
            })
    }
}

/// Collects retrievers before the registry is frozen
#[derive(Default)]
pub struct BackendRegistryBuilder {
    retrievers: HashMap<RepositoryType, Arc<dyn RevisionRetriever>>,
}

impl BackendRegistryBuilder {
    /// Register a retriever under the type it reports; a later one replaces an earlier one
    pub fn register(mut self, retriever: Arc<dyn RevisionRetriever>) -> Self {
        self.retrievers.insert(retriever.repository_type(), retriever);
        self
    }

    pub fn build(self) -> BackendRegistry {
        BackendRegistry {
            retrievers: self.retrievers,
        }
    }
}

//! revget - retrieve the content of a historical file revision
//!
//! Composition root: wires the subprocess runner, scratch space and backend
//! adapters into a [`BackendRegistry`] according to a [`RetrievalConfig`].
//!
//! ```no_run
//! # async fn demo() -> revget::Result<()> {
//! use revget::{RepositoryType, RetrievalConfig, RevisionId, RevisionService, TrackedFile};
//!
//! let service = RevisionService::from_config(RetrievalConfig::default());
//! let content = service
//!     .read_revision(
//!         RepositoryType::Sccs,
//!         &TrackedFile::new("/src/s.note.txt"),
//!         &RevisionId::new("1.2"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use revget_core::port::id_provider::UuidProvider;
use revget_core::port::time_provider::SystemTimeProvider;
use revget_core::port::{read_to_end, ProcessRunner, ScratchSpace};
use revget_infra_system::{
    ClearCaseRetriever, MercurialRetriever, RcsRetriever, SccsRetriever, SubprocessRunner,
    TempScratchSpace,
};
use tracing::info;

pub use crate::config::{ConfigError, RetrievalConfig};
pub use revget_core::application::BackendRegistry;
pub use revget_core::domain::{RepositoryType, RevisionId, TrackedFile};
pub use revget_core::port::{RevisionContent, RevisionStream};
pub use revget_core::{Result, RetrievalError};

/// Registry with every built-in backend
pub fn default_registry(
    runner: Arc<dyn ProcessRunner>,
    scratch: Arc<dyn ScratchSpace>,
) -> BackendRegistry {
    BackendRegistry::builder()
        .register(Arc::new(SccsRetriever::new(runner.clone())))
        .register(Arc::new(RcsRetriever::new(runner.clone())))
        .register(Arc::new(MercurialRetriever::new(runner.clone())))
        .register(Arc::new(ClearCaseRetriever::new(runner, scratch)))
        .build()
}

/// Entry point for callers: a configured registry plus the tool paths to use
///
/// Cheap to clone and safe to share between tasks.
#[derive(Clone)]
pub struct RevisionService {
    config: Arc<RetrievalConfig>,
    registry: BackendRegistry,
}

impl RevisionService {
    pub fn from_config(config: RetrievalConfig) -> Self {
        let runner = Arc::new(
            SubprocessRunner::new(Arc::new(SystemTimeProvider))
                .with_timeout(config.timeout())
                .with_kill_grace(config.kill_grace())
                .with_stderr_limit(config.stderr_limit_bytes),
        );
        let scratch = Arc::new(TempScratchSpace::new(
            config.scratch_root(),
            Arc::new(UuidProvider),
        ));

        info!(
            scratch_root = %scratch.root().display(),
            timeout_ms = ?config.timeout_ms,
            "Revision service ready"
        );

        Self::with_registry(config, default_registry(runner, scratch))
    }

    /// Use a caller-built registry (e.g. with test doubles)
    pub fn with_registry(config: RetrievalConfig, registry: BackendRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Stream a revision using the configured tool for the backend
    pub async fn get_revision(
        &self,
        repository_type: RepositoryType,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        let tool = self.config.tool(repository_type);
        self.registry
            .get_revision(repository_type, tool, file, revision)
            .await
    }

    /// Stream a revision with an explicit tool path
    pub async fn get_revision_with_tool(
        &self,
        repository_type: RepositoryType,
        tool: &str,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<RevisionStream> {
        self.registry
            .get_revision(repository_type, tool, file, revision)
            .await
    }

    /// Fetch a whole revision into memory
    pub async fn read_revision(
        &self,
        repository_type: RepositoryType,
        file: &TrackedFile,
        revision: &RevisionId,
    ) -> Result<Vec<u8>> {
        let stream = self.get_revision(repository_type, file, revision).await?;
        read_to_end(stream).await
    }
}

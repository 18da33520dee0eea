// Domain Layer - Retrieval requests and scoped resources

pub mod invocation;
pub mod repository;
pub mod revision;
pub mod scratch;

// Re-exports
pub use invocation::ToolInvocation;
pub use repository::RepositoryType;
pub use revision::{RevisionId, TrackedFile};
pub use scratch::ScratchDirectory;

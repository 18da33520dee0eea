// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod process_runner;
pub mod revision_retriever;
pub mod scratch_space;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use process_runner::ProcessRunner;
pub use revision_retriever::{read_to_end, RevisionContent, RevisionRetriever, RevisionStream};
pub use scratch_space::ScratchSpace;
pub use time_provider::TimeProvider;

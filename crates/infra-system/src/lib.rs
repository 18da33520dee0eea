// revget Infrastructure - System Adapters
// Implements: ProcessRunner, ScratchSpace, RevisionRetriever (per backend)

pub mod backends;
pub mod process_stream;
pub mod scratch_space;
pub mod subprocess_runner;

pub use backends::{ClearCaseRetriever, MercurialRetriever, RcsRetriever, SccsRetriever};
pub use process_stream::ProcessStream;
pub use scratch_space::{ScratchFileStream, TempScratchSpace};
pub use subprocess_runner::SubprocessRunner;

// Scratch Space Port
// Call-private directories for tools that must write a working copy

use crate::domain::ScratchDirectory;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Scratch space manager
///
/// Every `acquire` yields a directory no other call can observe.
#[async_trait]
pub trait ScratchSpace: Send + Sync {
    /// Create a fresh, uniquely named directory
    ///
    /// # Arguments
    /// * `label` - Human-readable prefix for the directory name (e.g. backend tag)
    ///
    /// # Errors
    /// - RetrievalError::Resource if the directory cannot be created
    async fn acquire(&self, label: &str) -> Result<ScratchDirectory>;

    /// Directory under which scratch directories are created
    fn root(&self) -> &Path;
}

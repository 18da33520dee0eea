// Repository Type Tag

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Backend tag used by the registry to select a retriever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Sccs,
    Rcs,
    #[serde(alias = "hg")]
    Mercurial,
    #[serde(alias = "cleartool")]
    ClearCase,
}

impl RepositoryType {
    pub const ALL: [RepositoryType; 4] = [
        RepositoryType::Sccs,
        RepositoryType::Rcs,
        RepositoryType::Mercurial,
        RepositoryType::ClearCase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Sccs => "sccs",
            RepositoryType::Rcs => "rcs",
            RepositoryType::Mercurial => "mercurial",
            RepositoryType::ClearCase => "clearcase",
        }
    }

    /// Conventional executable name for this backend
    pub fn default_tool(&self) -> &'static str {
        match self {
            RepositoryType::Sccs => "sccs",
            RepositoryType::Rcs => "co",
            RepositoryType::Mercurial => "hg",
            RepositoryType::ClearCase => "cleartool",
        }
    }
}

impl std::fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sccs" => Ok(RepositoryType::Sccs),
            "rcs" => Ok(RepositoryType::Rcs),
            "mercurial" | "hg" => Ok(RepositoryType::Mercurial),
            "clearcase" | "cleartool" => Ok(RepositoryType::ClearCase),
            other => Err(other.to_string()),
        }
    }
}

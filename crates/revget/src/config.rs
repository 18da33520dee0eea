//! Retrieval configuration
//!
//! Loaded from an optional TOML file, then overridden by `REVGET_*` environment
//! variables (nested keys use `__`, e.g. `REVGET_TOOLS__SCCS=/opt/sccs/bin/sccs`).

use ::config::{Config, Environment, File, FileFormat};
use revget_core::application::constants::{
    DEFAULT_SCRATCH_DIR_NAME, GRACEFUL_SHUTDOWN_TIMEOUT, STDERR_CAPTURE_LIMIT,
};
use revget_core::domain::RepositoryType;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "REVGET";
const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by every retrieval made through one service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Parent of per-call scratch directories (`~` expanded)
    pub scratch_root: Option<String>,
    /// Upper bound on one tool run; none by default
    pub timeout_ms: Option<u64>,
    pub kill_grace_ms: u64,
    pub stderr_limit_bytes: usize,
    /// Tool path per backend, falling back to the conventional executable name
    pub tools: HashMap<RepositoryType, String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            timeout_ms: None,
            kill_grace_ms: GRACEFUL_SHUTDOWN_TIMEOUT.as_millis() as u64,
            stderr_limit_bytes: STDERR_CAPTURE_LIMIT,
            tools: HashMap::new(),
        }
    }
}

impl RetrievalConfig {
    /// Load from `file` (if given) and the process environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(file, None)
    }

    /// Same as `load`, with an explicit environment instead of the process one
    pub fn load_with_env(
        file: Option<&Path>,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder
                .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let loaded: RetrievalConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.stderr_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "stderr_limit_bytes must be positive".to_string(),
            ));
        }
        if let Some((ty, _)) = self.tools.iter().find(|(_, tool)| tool.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("empty tool path for {}", ty)));
        }
        Ok(())
    }

    pub fn scratch_root(&self) -> PathBuf {
        match &self.scratch_root {
            Some(root) => PathBuf::from(shellexpand::tilde(root).into_owned()),
            None => std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Tool to run for `repository_type`
    pub fn tool(&self, repository_type: RepositoryType) -> &str {
        self.tools
            .get(&repository_type)
            .map(String::as_str)
            .unwrap_or_else(|| repository_type.default_tool())
    }
}

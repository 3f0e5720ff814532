//! Configuration structures and utilities

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base identifier used when the caller does not provide one.
pub const DEFAULT_BASE_URI: &str = "uri:unused";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Base identifier recorded in the header and used to resolve relative IRIs
    pub base_uri: String,
    /// Number of terms per front-coded dictionary block
    pub block_size: u32,
    /// Notify the progress listener every this many triples (0 disables it)
    pub progress_interval: u64,
    /// Refuse to hold more than this many triples in memory
    pub max_triples: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BASE_URI.to_string(),
            block_size: 16,
            progress_interval: 100_000,
            max_triples: None,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be at least 1".to_string()));
        }
        if self.base_uri.is_empty() {
            return Err(Error::Config("base_uri must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: BuildConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}

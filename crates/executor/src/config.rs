//! Database configuration via `docwrite.toml`
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! default configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use docwrite_core::{Error, Result};
use docwrite_patch::ScriptConfig;
use docwrite_storage::StoreConfig;

use crate::executor::BatchConfig;

/// Config file name placed next to the data it configures.
pub const CONFIG_FILE_NAME: &str = "docwrite.toml";

fn default_max_batch_size() -> usize {
    BatchConfig::default().max_batch_size
}

fn default_max_key_length() -> usize {
    BatchConfig::default().max_key_length
}

/// Database configuration loaded from `docwrite.toml`.
///
/// # Example
///
/// ```toml
/// max_batch_size = 1024
/// max_key_length = 512
///
/// [store]
/// stamp_last_modified = true
///
/// [scripts]
/// max_steps = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocwriteConfig {
    /// Largest accepted batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Longest accepted document key, in bytes.
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,
    /// Store behaviour.
    #[serde(default)]
    pub store: StoreConfig,
    /// Script limits.
    #[serde(default)]
    pub scripts: ScriptConfig,
}

impl Default for DocwriteConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_key_length: default_max_key_length(),
            store: StoreConfig::default(),
            scripts: ScriptConfig::default(),
        }
    }
}

impl DocwriteConfig {
    /// Limits handed to the executor.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_batch_size: self.max_batch_size,
            max_key_length: self.max_key_length,
        }
    }

    /// Reject limits that would make every batch fail.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(Error::validation("max_batch_size must be at least 1"));
        }
        if self.max_key_length == 0 {
            return Err(Error::validation("max_key_length must be at least 1"));
        }
        if self.scripts.max_steps == 0 {
            return Err(Error::validation("scripts.max_steps must be at least 1"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docwrite configuration

# Largest number of commands accepted in one batch.
max_batch_size = 1024

# Longest accepted document key, in bytes.
max_key_length = 512

[store]
# Stamp "@last-modified" into document metadata on every committed write.
stamp_last_modified = true

[scripts]
# Maximum statements executed per patch script run.
max_steps = 10000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds invalid limits.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: DocwriteConfig = toml::from_str(&content).map_err(|e| {
            Error::validation(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::storage(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::storage(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::storage(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

//! Runtime configuration.
//!
//! One [`QuireConfig`] is built at process start (usually from a TOML file)
//! and handed to [`Quire::open`](crate::Quire::open). Components receive the
//! pieces they need by value; nothing reads configuration from globals.
//!
//! ```toml
//! [storage]
//! database = "/var/lib/quire/fs.db"
//! content_database = "/var/lib/quire/content.db"
//!
//! [quota]
//! default_bytes = 104857600
//!
//! [files]
//! max_rename_attempts = 1000
//! max_upload_bytes = 67108864
//! chunk_size = 4096
//!
//! [policy]
//! hide_forbidden = false
//!
//! [hooks]
//! on_delete = ["audit"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path value that selects an in-memory SQLite database.
pub const IN_MEMORY: &str = ":memory:";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    pub files: FilesConfig,
    pub policy: PolicyConfig,
    pub hooks: HooksConfig,
}

/// Where the two stores live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Metadata database (inodes, files, thumbnails, quotas).
    pub database: PathBuf,
    /// Content store database.
    pub content_database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(IN_MEMORY),
            content_database: PathBuf::from(IN_MEMORY),
        }
    }
}

/// Quota defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Limit for tenants without an explicit quota row.
    pub default_bytes: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_bytes: 100 * 1024 * 1024,
        }
    }
}

/// File handling limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Upper bound on `"name (n)"` suffixes tried by rename-on-conflict.
    pub max_rename_attempts: u32,
    /// Uploads larger than this are rejected as too large in batch creates.
    pub max_upload_bytes: u64,
    /// Chunk size for streamed reads.
    pub chunk_size: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_rename_attempts: 1000,
            max_upload_bytes: 64 * 1024 * 1024,
            chunk_size: 4096,
        }
    }
}

/// Access policy switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Report permission denials on paths as "no such node".
    pub hide_forbidden: bool,
}

/// Names of registered hooks to run per event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub on_delete: Vec<String>,
}

impl QuireConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Set the default quota.
    pub fn with_default_quota(mut self, bytes: u64) -> Self {
        self.quota.default_bytes = bytes;
        self
    }

    /// Enable or disable hiding of permission denials.
    pub fn with_hide_forbidden(mut self, hide: bool) -> Self {
        self.policy.hide_forbidden = hide;
        self
    }

    /// Set the rename-on-conflict bound.
    pub fn with_max_rename_attempts(mut self, attempts: u32) -> Self {
        self.files.max_rename_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = QuireConfig::default();
        assert_eq!(config.quota.default_bytes, 100 * 1024 * 1024);
        assert_eq!(config.storage.database, PathBuf::from(IN_MEMORY));
        assert_eq!(config.files.chunk_size, 4096);
        assert!(!config.policy.hide_forbidden);
        assert!(config.hooks.on_delete.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = QuireConfig::from_toml_str(
            r#"
            [quota]
            default_bytes = 10

            [hooks]
            on_delete = ["audit", "index"]
            "#,
        )
        .unwrap();
        assert_eq!(config.quota.default_bytes, 10);
        assert_eq!(config.hooks.on_delete, vec!["audit", "index"]);
        assert_eq!(config.files.max_rename_attempts, 1000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = QuireConfig::from_toml_str("[quota]\ndefault_bytes = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nhide_forbidden = true").unwrap();
        let config = QuireConfig::load(file.path()).unwrap();
        assert!(config.policy.hide_forbidden);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = QuireConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, QuireConfig::default());
    }
}

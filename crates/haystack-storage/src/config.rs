use std::path::{Path, PathBuf};
use std::time::Duration;

use haystack_ledger::DEFAULT_REGISTRATION_ATTEMPTS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default largest accepted page size.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Settings for [`BundleStore::open`](crate::BundleStore::open).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory of the filesystem object backend.
    pub data_dir: PathBuf,
    /// Index snapshot file. Defaults to `{data_dir}/index.bin`.
    pub index_path: Option<PathBuf>,
    /// Attempts for the ownership registration transaction.
    pub registration_attempts: usize,
    pub max_page_size: usize,
    /// Per-call timeout for filesystem I/O, in milliseconds.
    pub io_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./haystack"),
            index_path: None,
            registration_attempts: DEFAULT_REGISTRATION_ATTEMPTS,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            io_timeout_ms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl StoreConfig {
    /// A config rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registration_attempts == 0 {
            return Err(ConfigError::Invalid(
                "registration_attempts must be at least 1".into(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be at least 1".into()));
        }
        if self.io_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("io_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("index.bin"))
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

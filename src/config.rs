use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io::charset_for_label;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown charset label: {0}")]
    UnknownCharset(String),
}

/// Importer settings, read from TOML. Every key is optional.
///
/// ```toml
/// upload_dir = "/var/lib/grant-import/uploads"
/// staging_ttl_secs = 3600
/// charset = "windows-1252"
///
/// [log]
/// filter = "grant_csv_import=debug"
/// json = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Where accepted uploads are stored.
    pub upload_dir: PathBuf,
    /// Lifetime of a staged batch and of a staged summary.
    pub staging_ttl_secs: u64,
    /// Encoding label of uploaded files.
    pub charset: String,
    pub log: LogConfig,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("grant-imports"),
            staging_ttl_secs: 3600,
            charset: "utf-8".into(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

impl ImporterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.encoding()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn staging_ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.staging_ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        chrono::Duration::seconds(secs)
    }

    pub fn encoding(&self) -> Result<&'static encoding_rs::Encoding, ConfigError> {
        charset_for_label(&self.charset).ok_or_else(|| ConfigError::UnknownCharset(self.charset.clone()))
    }
}

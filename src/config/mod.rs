//! Configuration
//!
//! Three layers, later ones winning:
//! 1. Built-in defaults
//! 2. User config file (`~/.config/tro/config.toml`, or `--config`)
//! 3. CLI flags and their environment variables

mod defaults;
mod effective;
mod merge;

pub use defaults::{MetadataSettings, ScanSettings, SigningSettings, TimestampSettings};
pub use effective::{ConfigOrigin, ConfigSource, EffectiveConfig, REDACTED};
pub use merge::{merge_into, merge_layers, strip_nulls};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::document::DocumentMetadata;
use crate::scan::{IgnoreRules, ScanOptions, MAX_WORKERS};
use crate::seal::{AuthorityEndpoints, SigningKey};
use crate::timeout::{TimeoutConfig, TimeoutValidationError};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Timeout(#[from] TimeoutValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// All settings, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Declaration file; sidecars share its base name
    pub declaration: PathBuf,
    /// Trusted-system profile, read only when a declaration is created
    pub profile: Option<PathBuf>,
    pub metadata: MetadataSettings,
    pub signing: SigningSettings,
    pub timestamp: TimestampSettings,
    pub timeouts: TimeoutConfig,
    pub scan: ScanSettings,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            declaration: defaults::default_declaration(),
            profile: None,
            metadata: MetadataSettings::default(),
            signing: SigningSettings::default(),
            timestamp: TimestampSettings::default(),
            timeouts: TimeoutConfig::default(),
            scan: ScanSettings::default(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()?;
        if self.scan.workers == 0 || self.scan.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "scan.workers must be in [1, {}], got {}",
                MAX_WORKERS, self.scan.workers
            )));
        }
        if self.declaration.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("declaration path is empty".into()));
        }
        for url in [
            &self.timestamp.url,
            &self.timestamp.tsa_cert_url,
            &self.timestamp.ca_cert_url,
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!("'{}' is not an http(s) URL", url)));
            }
        }
        Ok(())
    }

    pub fn document_metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            creator: self.metadata.creator.clone(),
            name: self.metadata.name.clone(),
            description: self.metadata.description.clone(),
        }
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey {
            key_id: self.signing.key_id.clone(),
            passphrase: self.signing.passphrase.clone(),
        }
    }

    pub fn authority_endpoints(&self) -> AuthorityEndpoints {
        AuthorityEndpoints {
            url: self.timestamp.url.clone(),
            tsa_cert_url: self.timestamp.tsa_cert_url.clone(),
            ca_cert_url: self.timestamp.ca_cert_url.clone(),
        }
    }

    pub fn scan_options(&self) -> Result<ScanOptions, ConfigError> {
        let ignore = IgnoreRules::new(&self.scan.ignore_dirs)
            .map_err(|e| ConfigError::Invalid(format!("scan.ignore_dirs: {}", e)))?;
        Ok(ScanOptions::default()
            .with_ignore(ignore)
            .with_workers(self.scan.workers))
    }
}

/// `~/.config/tro/config.toml`, if `HOME` is set.
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/tro/config.toml"))
}

//! Built-in settings (the lowest layer)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::document::DEFAULT_DECLARATION;
use crate::scan::DEFAULT_WORKERS;
use crate::seal::timestamp::{DEFAULT_CA_CERT_URL, DEFAULT_TSA_CERT_URL, DEFAULT_TSA_URL};

/// Header written into new declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub creator: String,
    pub name: String,
    pub description: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            creator: "TRO utils".to_string(),
            name: "Some TRO".to_string(),
            description: "Some description".to_string(),
        }
    }
}

/// GnuPG settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSettings {
    /// Key fingerprint used for signing and public key export
    pub key_id: Option<String>,
    pub passphrase: Option<String>,
    /// Keyring directory passed as `--homedir`
    pub gpg_home: Option<PathBuf>,
    pub gpg_binary: PathBuf,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            key_id: None,
            passphrase: None,
            gpg_home: None,
            gpg_binary: PathBuf::from("gpg"),
        }
    }
}

/// Timestamp authority settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampSettings {
    pub url: String,
    pub tsa_cert_url: String,
    pub ca_cert_url: String,
    pub openssl_binary: PathBuf,
}

impl Default for TimestampSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_TSA_URL.to_string(),
            tsa_cert_url: DEFAULT_TSA_CERT_URL.to_string(),
            ca_cert_url: DEFAULT_CA_CERT_URL.to_string(),
            openssl_binary: PathBuf::from("openssl"),
        }
    }
}

/// Directory scan settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Directory names pruned from every scan
    pub ignore_dirs: Vec<String>,
    /// Hashing threads
    pub workers: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ignore_dirs: vec![".git".to_string()],
            workers: DEFAULT_WORKERS,
        }
    }
}

pub(crate) fn default_declaration() -> PathBuf {
    PathBuf::from(DEFAULT_DECLARATION)
}

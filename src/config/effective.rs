//! Effective configuration
//!
//! Layers are merged as JSON, then decoded into [`LedgerConfig`] and
//! validated. A redacted copy of the merged value, with where each layer
//! came from, is kept for `tro config`.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::merge::{merge_layers, strip_nulls};
use super::{ConfigError, LedgerConfig};
use crate::digest::sha256_bytes;

/// Replacement text for secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Key names whose values never appear in a dump.
const SECRET_KEYS: &[&str] = &["passphrase", "password", "secret", "token"];

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// One contributing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// SHA-256 of the file bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Decoded settings plus their provenance.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub settings: LedgerConfig,
    pub sources: Vec<ConfigSource>,
    redacted: Value,
    redactions: Vec<String>,
}

#[derive(Serialize)]
struct Dump<'a> {
    config: &'a Value,
    sources: &'a [ConfigSource],
    redactions: &'a [String],
}

impl EffectiveConfig {
    /// Merge built-in defaults, an optional TOML file, and CLI overrides.
    ///
    /// `file` is skipped when it does not exist unless `required` is set.
    pub fn build(file: Option<&Path>, required: bool, cli: Value) -> Result<Self, ConfigError> {
        let mut layers = vec![serde_json::to_value(LedgerConfig::default())?];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file {
            if path.exists() {
                let (value, digest) = load_toml(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_path_buf()),
                    digest: Some(digest),
                });
            } else if required {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }

        let cli = strip_nulls(cli);
        if cli.as_object().is_some_and(|map| !map.is_empty()) {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings: LedgerConfig =
            serde_json::from_value(merged.clone()).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;

        let mut redacted = merged;
        let mut redactions = Vec::new();
        redact(&mut redacted, "", &mut redactions);

        tracing::debug!(layers = sources.len(), "Configuration resolved");
        Ok(Self {
            settings,
            sources,
            redacted,
            redactions,
        })
    }

    /// Merged configuration with secrets replaced.
    pub fn redacted(&self) -> &Value {
        &self.redacted
    }

    /// Dotted paths of redacted keys.
    pub fn redactions(&self) -> &[String] {
        &self.redactions
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Dump {
            config: &self.redacted,
            sources: &self.sources,
            redactions: &self.redactions,
        })
    }
}

fn load_toml(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = sha256_bytes(&bytes).to_string();
    let text = String::from_utf8(bytes)
        .map_err(|e| ConfigError::Parse(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let table: toml::Table =
        toml::from_str(&text).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    let value = serde_json::to_value(table)?;
    Ok((value, digest))
}

fn redact(value: &mut Value, prefix: &str, redactions: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map.iter_mut() {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let lower = key.to_lowercase();
        if SECRET_KEYS.iter().any(|s| lower.contains(s)) && !child.is_object() {
            if !child.is_null() {
                *child = Value::String(REDACTED.to_string());
                redactions.push(path);
            }
        } else {
            redact(child, &path, redactions);
        }
    }
}

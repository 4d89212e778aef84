//! Trusted research system profile
//!
//! The profile describes the system that assembled the declaration: what
//! capabilities it advertises and, once signed, its public key. Any other
//! fields in the profile file are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use trov_vocab::{node_type, CapabilityKind, TRS_ID};

use crate::error::{LedgerError, LedgerResult};

fn trs_id() -> String {
    TRS_ID.to_string()
}

fn trs_types() -> Vec<String> {
    vec![
        node_type::TRUSTED_SYSTEM.to_string(),
        node_type::ORGANIZATION.to_string(),
    ]
}

/// An advertised capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub node_type: String,
}

impl Capability {
    /// Parsed kind, `None` for capability types outside the vocabulary.
    pub fn kind(&self) -> Option<CapabilityKind> {
        self.node_type.parse().ok()
    }
}

/// The `trov:wasAssembledBy` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustProfile {
    #[serde(rename = "@id", default = "trs_id")]
    id: String,
    #[serde(rename = "@type", default = "trs_types")]
    node_types: Vec<String>,
    #[serde(rename = "trov:hasCapability", default)]
    capabilities: Vec<Capability>,
    #[serde(rename = "trov:publicKey", default, skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(flatten)]
    descriptive: BTreeMap<String, Value>,
}

impl Default for TrustProfile {
    fn default() -> Self {
        let mut descriptive = BTreeMap::new();
        descriptive.insert(
            "schema:description".to_string(),
            Value::String("Default TRS with no capabilities".to_string()),
        );
        Self {
            id: trs_id(),
            node_types: trs_types(),
            capabilities: Vec::new(),
            public_key: None,
            descriptive,
        }
    }
}

impl TrustProfile {
    /// Read a profile from a JSON file.
    ///
    /// A missing file yields the default profile. A file that cannot be
    /// read or parsed is a configuration error.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Profile not found, using default profile");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Configuration(format!("cannot read profile {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
            .map_err(|e| LedgerError::Configuration(format!("invalid profile {}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut profile: Self = serde_json::from_str(json)?;
        // The node always describes the assembling system.
        profile.id = trs_id();
        Ok(profile)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// The advertised capability of the given kind, if any.
    pub fn capability(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.kind() == Some(kind))
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Set the public key. Returns true if it changed.
    pub fn set_public_key(&mut self, key: String) -> bool {
        if self.public_key.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.public_key = Some(key);
        true
    }

    pub fn description(&self) -> Option<&str> {
        self.descriptive
            .get("schema:description")
            .or_else(|| self.descriptive.get("rdfs:comment"))
            .and_then(Value::as_str)
    }
}

//! Content-addressed artifact catalog
//!
//! The composition maps every distinct SHA-256 content hash to exactly
//! one [`Artifact`]. Ids are assigned sequentially from the catalog size
//! and never reused. The fingerprint is a digest over the sorted set of
//! content hashes, recomputed once per ingestion batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use trov_vocab::{node_type, COMPOSITION_ID, FINGERPRINT_ID, SYMLINK_MIME_TYPE};

use crate::digest::{sha256_bytes, ContentHash};
use crate::error::{LedgerError, LedgerResult};
use crate::ids::ArtifactId;
use crate::scan::{EntryKind, ScannedFile};
use crate::sniff::{mime_type_or_fallback, ContentSniffer};

fn artifact_type() -> String {
    node_type::ARTIFACT.to_string()
}

fn composition_type() -> String {
    node_type::COMPOSITION.to_string()
}

fn composition_id() -> String {
    COMPOSITION_ID.to_string()
}

/// A distinct piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "@id")]
    id: ArtifactId,
    #[serde(rename = "@type", default = "artifact_type")]
    node_type: String,
    #[serde(rename = "trov:sha256")]
    sha256: ContentHash,
    #[serde(rename = "trov:mimeType")]
    mime_type: String,
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn sha256(&self) -> &ContentHash {
        &self.sha256
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Digest over the catalog's content hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    node_type: String,
    #[serde(rename = "trov:sha256")]
    sha256: String,
}

impl Fingerprint {
    fn new(sha256: String) -> Self {
        Self {
            id: FINGERPRINT_ID.to_string(),
            node_type: node_type::FINGERPRINT.to_string(),
            sha256,
        }
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// The artifact catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    #[serde(rename = "@id", default = "composition_id")]
    id: String,
    #[serde(rename = "@type", default = "composition_type")]
    node_type: String,
    #[serde(rename = "trov:hasArtifact", default)]
    artifacts: Vec<Artifact>,
    #[serde(rename = "trov:hasFingerprint", default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<Fingerprint>,
    #[serde(skip)]
    by_hash: HashMap<ContentHash, ArtifactId>,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            id: composition_id(),
            node_type: composition_type(),
            artifacts: Vec::new(),
            fingerprint: None,
            by_hash: HashMap::new(),
        }
    }
}

impl PartialEq for Composition {
    fn eq(&self, other: &Self) -> bool {
        self.artifacts == other.artifacts && self.fingerprint == other.fingerprint
    }
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the hash index after deserialization and check that ids
    /// and hashes are unique and ids match their positions.
    pub(crate) fn reindex(&mut self) -> LedgerResult<()> {
        self.artifacts.sort_by_key(|a| a.id);
        self.by_hash.clear();
        for (position, artifact) in self.artifacts.iter().enumerate() {
            if artifact.id.index() != position {
                return Err(LedgerError::MalformedDocument(format!(
                    "artifact ids are not sequential: expected {} at position {}, found {}",
                    ArtifactId::new(position),
                    position,
                    artifact.id
                )));
            }
            if self.by_hash.insert(artifact.sha256.clone(), artifact.id).is_some() {
                return Err(LedgerError::MalformedDocument(format!(
                    "content hash {} is recorded by more than one artifact",
                    artifact.sha256
                )));
            }
        }
        Ok(())
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn artifact(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(id.index()).filter(|a| a.id == id)
    }

    pub fn by_hash(&self, hash: &ContentHash) -> Option<&Artifact> {
        self.by_hash.get(hash).and_then(|id| self.artifact(*id))
    }

    /// Current fingerprint, absent until the first ingestion.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_ref().map(|f| f.sha256())
    }

    /// Ingest a batch of scanned entries.
    ///
    /// Returns the artifact id of each entry, in input order. New
    /// artifacts are staged first and committed together, followed by a
    /// single fingerprint recompute.
    pub fn ingest_batch(&mut self, files: &[ScannedFile], sniffer: &dyn ContentSniffer) -> Vec<ArtifactId> {
        let mut staged: Vec<Artifact> = Vec::new();
        let mut staged_index: HashMap<&ContentHash, ArtifactId> = HashMap::new();
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            if let Some(id) = self.by_hash.get(&file.hash) {
                ids.push(*id);
                continue;
            }
            if let Some(id) = staged_index.get(&file.hash) {
                ids.push(*id);
                continue;
            }
            let id = ArtifactId::new(self.artifacts.len() + staged.len());
            let mime_type = match file.kind {
                EntryKind::Symlink => SYMLINK_MIME_TYPE.to_string(),
                EntryKind::File => mime_type_or_fallback(sniffer, &file.path),
            };
            tracing::debug!(%id, path = %file.path.display(), mime = %mime_type, "New artifact");
            staged.push(Artifact {
                id,
                node_type: artifact_type(),
                sha256: file.hash.clone(),
                mime_type,
            });
            staged_index.insert(&file.hash, id);
            ids.push(id);
        }

        let added = staged.len();
        for artifact in staged {
            self.by_hash.insert(artifact.sha256.clone(), artifact.id);
            self.artifacts.push(artifact);
        }
        if added > 0 || self.fingerprint.is_none() {
            self.recompute_fingerprint();
        }
        tracing::debug!(added, total = self.artifacts.len(), "Ingestion batch committed");
        ids
    }

    /// Sort all content hashes, concatenate, and hash the result.
    pub fn recompute_fingerprint(&mut self) {
        self.fingerprint = Some(Fingerprint::new(fingerprint_of(
            self.artifacts.iter().map(|a| &a.sha256),
        )));
    }
}

/// Fingerprint of a set of content hashes, independent of their order.
pub fn fingerprint_of<'a>(hashes: impl IntoIterator<Item = &'a ContentHash>) -> String {
    let mut sorted: Vec<&str> = hashes.into_iter().map(|h| h.as_str()).collect();
    sorted.sort_unstable();
    sha256_bytes(sorted.concat().as_bytes()).to_string()
}

//! Arrangement snapshots
//!
//! An arrangement binds every location seen in one directory scan to the
//! artifact holding its content. Once appended to a document it is never
//! edited: fields are private and only read accessors are exposed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use trov_vocab::node_type;

use crate::catalog::Composition;
use crate::digest::ContentHash;
use crate::error::{LedgerError, LedgerResult};
use crate::ids::{ArrangementId, ArtifactId, IdRef};
use crate::scan::ScannedFile;

fn arrangement_type() -> String {
    node_type::ARRANGEMENT.to_string()
}

fn locus_type() -> String {
    node_type::LOCUS.to_string()
}

/// One location within an arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locus {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type", default = "locus_type")]
    node_type: String,
    #[serde(rename = "trov:hasArtifact")]
    artifact: IdRef<ArtifactId>,
    #[serde(rename = "trov:hasLocation")]
    location: String,
}

impl Locus {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn artifact(&self) -> ArtifactId {
        self.artifact.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

/// A snapshot of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrangement {
    #[serde(rename = "@id")]
    id: ArrangementId,
    #[serde(rename = "@type", default = "arrangement_type")]
    node_type: String,
    #[serde(rename = "rdfs:comment", default)]
    comment: String,
    #[serde(rename = "trov:hasLocus", default)]
    loci: Vec<Locus>,
}

impl Arrangement {
    /// Build from scanned entries and the artifact id assigned to each.
    pub(crate) fn from_scan(
        id: ArrangementId,
        comment: String,
        files: &[ScannedFile],
        artifacts: &[ArtifactId],
    ) -> Self {
        let loci = files
            .iter()
            .zip(artifacts)
            .enumerate()
            .map(|(position, (file, artifact))| Locus {
                id: id.locus(position),
                node_type: locus_type(),
                artifact: IdRef::new(*artifact),
                location: file.location.clone(),
            })
            .collect();
        Self {
            id,
            node_type: arrangement_type(),
            comment,
            loci,
        }
    }

    pub fn id(&self) -> ArrangementId {
        self.id
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Loci in walk order.
    pub fn loci(&self) -> &[Locus] {
        &self.loci
    }

    /// `location → content hash`, resolved through `composition`.
    pub fn path_hash_map(&self, composition: &Composition) -> LedgerResult<BTreeMap<String, ContentHash>> {
        self.loci
            .iter()
            .map(|locus| {
                composition
                    .artifact(locus.artifact())
                    .map(|artifact| (locus.location.clone(), artifact.sha256().clone()))
                    .ok_or_else(|| LedgerError::ArtifactNotFound(locus.artifact().to_string()))
            })
            .collect()
    }
}

/// Default comment for a scan of `root`.
pub fn default_comment(root: &std::path::Path) -> String {
    format!("Scanned {}", root.display())
}

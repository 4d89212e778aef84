//! Performance records
//!
//! A performance describes work done between two arrangements: the one it
//! read and the one it produced. Attributes claimed by a performance are
//! warranted by capabilities the trusted system advertises.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use trov_vocab::{node_type, AttributeKind, TRS_ID};

use crate::arrangement::Arrangement;
use crate::error::{LedgerError, LedgerResult};
use crate::ids::{ArrangementId, IdRef, PerformanceId};
use crate::instant::{format_instant, serde_instant};
use crate::profile::TrustProfile;

/// Comment used when the caller gives none.
pub const DEFAULT_PERFORMANCE_COMMENT: &str = "Some performance";

fn performance_type() -> String {
    node_type::PERFORMANCE.to_string()
}

fn conducted_by_trs() -> IdRef<String> {
    IdRef::new(TRS_ID.to_string())
}

/// A claimed attribute and the capability that warrants it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceAttribute {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: AttributeKind,
    #[serde(rename = "trov:warrantedBy")]
    warranted_by: IdRef<String>,
}

impl PerformanceAttribute {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Id of the warranting capability in the profile.
    pub fn warrant(&self) -> &str {
        &self.warranted_by.id
    }
}

/// A recorded performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(rename = "@id")]
    id: PerformanceId,
    #[serde(rename = "@type", default = "performance_type")]
    node_type: String,
    #[serde(rename = "rdfs:comment", default)]
    comment: String,
    #[serde(rename = "trov:wasConductedBy", default = "conducted_by_trs")]
    conducted_by: IdRef<String>,
    #[serde(rename = "trov:hasPerformanceAttribute", default)]
    attributes: Vec<PerformanceAttribute>,
    #[serde(rename = "trov:startedAtTime", with = "serde_instant")]
    started_at: DateTime<Utc>,
    #[serde(rename = "trov:endedAtTime", with = "serde_instant")]
    ended_at: DateTime<Utc>,
    #[serde(rename = "trov:accessedArrangement", default, skip_serializing_if = "Option::is_none")]
    accessed: Option<IdRef<ArrangementId>>,
    #[serde(rename = "trov:contributedToArrangement", default, skip_serializing_if = "Option::is_none")]
    contributed: Option<IdRef<ArrangementId>>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Performance {
    pub fn id(&self) -> PerformanceId {
        self.id
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn attributes(&self) -> &[PerformanceAttribute] {
        &self.attributes
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Arrangement the performance read.
    pub fn accessed(&self) -> Option<ArrangementId> {
        self.accessed.as_ref().map(|r| r.id)
    }

    /// Arrangement the performance produced.
    pub fn contributed(&self) -> Option<ArrangementId> {
        self.contributed.as_ref().map(|r| r.id)
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

/// Input for [`crate::Document::add_performance`].
#[derive(Debug, Clone)]
pub struct PerformanceRequest {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub accessed: Option<String>,
    pub contributed: Option<String>,
    pub attributes: Vec<AttributeKind>,
    /// Free-form fields merged into the record.
    pub extra: BTreeMap<String, Value>,
}

impl PerformanceRequest {
    pub fn new(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at,
            comment: None,
            accessed: None,
            contributed: None,
            attributes: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn accessed(mut self, arrangement: impl Into<String>) -> Self {
        self.accessed = Some(arrangement.into());
        self
    }

    pub fn contributed(mut self, arrangement: impl Into<String>) -> Self {
        self.contributed = Some(arrangement.into());
        self
    }

    pub fn attribute(mut self, kind: AttributeKind) -> Self {
        self.attributes.push(kind);
        self
    }

    /// Add attributes by vocabulary name, rejecting unknown names.
    pub fn attribute_names<S: AsRef<str>>(mut self, names: &[S]) -> LedgerResult<Self> {
        for name in names {
            self.attributes.push(name.as_ref().parse::<AttributeKind>()?);
        }
        Ok(self)
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Keys that extra fields may not overwrite.
const RESERVED_KEYS: &[&str] = &[
    "@id",
    "@type",
    "rdfs:comment",
    "trov:wasConductedBy",
    "trov:hasPerformanceAttribute",
    "trov:startedAtTime",
    "trov:endedAtTime",
    "trov:accessedArrangement",
    "trov:contributedToArrangement",
];

fn resolve_arrangement(id: &str, arrangements: &[Arrangement]) -> LedgerResult<ArrangementId> {
    arrangements
        .iter()
        .map(Arrangement::id)
        .find(|candidate| candidate.to_string() == id)
        .ok_or_else(|| LedgerError::ArrangementNotFound {
            id: id.to_string(),
            available: arrangements.iter().map(|a| a.id().to_string()).collect(),
        })
}

/// Validate a request and build the record it describes.
///
/// Nothing is appended here; the caller pushes the returned record only
/// when every check has passed.
pub(crate) fn build_performance(
    id: PerformanceId,
    request: PerformanceRequest,
    arrangements: &[Arrangement],
    profile: &TrustProfile,
) -> LedgerResult<Performance> {
    if request.started_at > request.ended_at {
        return Err(LedgerError::InvalidTimeRange {
            started_at: format_instant(&request.started_at),
            ended_at: format_instant(&request.ended_at),
        });
    }

    let accessed = request
        .accessed
        .as_deref()
        .map(|a| resolve_arrangement(a, arrangements))
        .transpose()?;
    let contributed = request
        .contributed
        .as_deref()
        .map(|a| resolve_arrangement(a, arrangements))
        .transpose()?;

    let attributes = request
        .attributes
        .iter()
        .enumerate()
        .map(|(position, kind)| {
            let capability = kind.required_capability();
            let warrant = profile
                .capability(capability)
                .ok_or(LedgerError::CapabilityNotAdvertised {
                    attribute: *kind,
                    capability,
                })?;
            Ok(PerformanceAttribute {
                id: id.attribute(position),
                kind: *kind,
                warranted_by: IdRef::new(warrant.id.clone()),
            })
        })
        .collect::<LedgerResult<Vec<_>>>()?;

    if let Some(key) = request.extra.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
        return Err(LedgerError::MalformedDocument(format!(
            "extra performance field '{}' would overwrite a recorded property",
            key
        )));
    }

    Ok(Performance {
        id,
        node_type: performance_type(),
        comment: request
            .comment
            .unwrap_or_else(|| DEFAULT_PERFORMANCE_COMMENT.to_string()),
        conducted_by: conducted_by_trs(),
        attributes,
        started_at: request.started_at,
        ended_at: request.ended_at,
        accessed: accessed.map(IdRef::new),
        contributed: contributed.map(IdRef::new),
        extra: request.extra,
    })
}

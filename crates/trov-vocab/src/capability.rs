//! Performance attributes and the system capabilities that warrant them.
//!
//! A performance may claim an attribute only when the trusted research
//! system advertises the paired capability. The pairing is a fixed table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability a trusted research system can advertise in its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapabilityKind {
    #[serde(rename = "trov:CanRecordInternetAccess")]
    CanRecordInternetAccess,
    #[serde(rename = "trov:CanProvideInternetIsolation")]
    CanProvideInternetIsolation,
}

/// Attribute a performance can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKind {
    #[serde(rename = "trov:InternetAccessRecording")]
    InternetAccessRecording,
    #[serde(rename = "trov:InternetIsolation")]
    InternetIsolation,
}

/// Attribute ↔ capability pairing, one row per kind in declaration order.
///
/// Both conversions index this table by discriminant.
pub const CAPABILITY_MAPPING: &[(AttributeKind, CapabilityKind)] = &[
    (
        AttributeKind::InternetAccessRecording,
        CapabilityKind::CanRecordInternetAccess,
    ),
    (
        AttributeKind::InternetIsolation,
        CapabilityKind::CanProvideInternetIsolation,
    ),
];

const _: () = {
    assert!(CAPABILITY_MAPPING.len() == AttributeKind::ALL.len());
    assert!(CAPABILITY_MAPPING.len() == CapabilityKind::ALL.len());
    let mut i = 0;
    while i < CAPABILITY_MAPPING.len() {
        assert!(CAPABILITY_MAPPING[i].0 as usize == i);
        assert!(CAPABILITY_MAPPING[i].1 as usize == i);
        i += 1;
    }
};

/// Error returned when a kind name is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {vocabulary} '{value}' (expected one of: {expected})")]
pub struct ParseKindError {
    pub vocabulary: &'static str,
    pub value: String,
    pub expected: String,
}

impl CapabilityKind {
    pub const ALL: &'static [CapabilityKind] = &[
        CapabilityKind::CanRecordInternetAccess,
        CapabilityKind::CanProvideInternetIsolation,
    ];

    /// Prefixed vocabulary term, e.g. `trov:CanRecordInternetAccess`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanRecordInternetAccess => "trov:CanRecordInternetAccess",
            Self::CanProvideInternetIsolation => "trov:CanProvideInternetIsolation",
        }
    }

    /// The attribute this capability warrants.
    pub fn attribute(self) -> AttributeKind {
        CAPABILITY_MAPPING[self as usize].0
    }
}

impl AttributeKind {
    pub const ALL: &'static [AttributeKind] = &[
        AttributeKind::InternetAccessRecording,
        AttributeKind::InternetIsolation,
    ];

    /// Prefixed vocabulary term, e.g. `trov:InternetIsolation`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InternetAccessRecording => "trov:InternetAccessRecording",
            Self::InternetIsolation => "trov:InternetIsolation",
        }
    }

    /// The capability a system must advertise for this attribute to be claimed.
    pub fn required_capability(self) -> CapabilityKind {
        CAPABILITY_MAPPING[self as usize].1
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match either the prefixed term (`trov:X`) or the bare local name (`X`).
fn matches_term(term: &str, input: &str) -> bool {
    term == input || term.strip_prefix("trov:") == Some(input)
}

fn expected_list<T: fmt::Display>(all: &[T]) -> String {
    all.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

impl FromStr for CapabilityKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| matches_term(k.as_str(), s))
            .ok_or_else(|| ParseKindError {
                vocabulary: "capability",
                value: s.to_string(),
                expected: expected_list(Self::ALL),
            })
    }
}

impl FromStr for AttributeKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| matches_term(k.as_str(), s))
            .ok_or_else(|| ParseKindError {
                vocabulary: "performance attribute",
                value: s.to_string(),
                expected: expected_list(Self::ALL),
            })
    }
}

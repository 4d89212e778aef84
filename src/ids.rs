//! Typed identifiers
//!
//! Cross-references inside a declaration are id strings such as
//! `arrangement/3`. Each kind of sequential id gets its own type so an
//! artifact id can never be passed where an arrangement id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An id string that does not have the expected `prefix/N` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id '{value}'")]
pub struct ParseIdError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(index: usize) -> Self {
                Self(index)
            }

            /// Sequence number within the declaration.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.strip_prefix(Self::PREFIX)
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(Self)
                    .ok_or_else(|| ParseIdError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

sequential_id!(
    /// `composition/1/artifact/N`
    ArtifactId,
    "artifact",
    "composition/1/artifact/"
);

sequential_id!(
    /// `arrangement/N`
    ArrangementId,
    "arrangement",
    "arrangement/"
);

sequential_id!(
    /// `trp/N`
    PerformanceId,
    "performance",
    "trp/"
);

impl ArrangementId {
    /// Id of the `position`-th locus of this arrangement.
    pub fn locus(self, position: usize) -> String {
        format!("{}/locus/{}", self, position)
    }
}

impl PerformanceId {
    /// Id of the `position`-th attribute of this performance.
    pub fn attribute(self, position: usize) -> String {
        format!("{}/attribute/{}", self, position)
    }
}

/// A JSON-LD node reference: `{"@id": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef<T> {
    #[serde(rename = "@id")]
    pub id: T,
}

impl<T> IdRef<T> {
    pub fn new(id: T) -> Self {
        Self { id }
    }
}

//! Replication package verification
//!
//! Compares the files in a package against a recorded arrangement and
//! classifies every discrepancy.
//!
//! Classification, for each package entry kept after the subpath filter:
//! - the path is not recorded in the arrangement: `missing`
//! - the recorded hash differs from the actual one, or there is no
//!   recorded hash: `mismatched`
//!
//! A path that is not recorded is therefore reported in both lists, with
//! no expected hash in `mismatched`. Recorded paths that no package entry
//! consumed end up in `extra`. Entries outside the subpath are skipped but
//! do not consume their recorded path, so those paths show up in `extra`
//! as well.

pub mod package;

pub use package::{read_package, PackageEntry, PackageError, PackageKind};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::digest::ContentHash;
use crate::ids::ArrangementId;

/// A package entry whose content differs from the recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashMismatch {
    pub path: String,
    pub expected: Option<ContentHash>,
    pub actual: ContentHash,
}

/// Outcome of comparing a package with an arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    pub arrangement: ArrangementId,
    pub package: PathBuf,
    pub subpath: Option<String>,
    pub missing: Vec<String>,
    pub mismatched: Vec<HashMismatch>,
    pub extra: Vec<String>,
    pub is_valid: bool,
}

impl ReplicationReport {
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}

impl fmt::Display for ReplicationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            return write!(f, "Replication package matches {}", self.arrangement);
        }
        writeln!(f, "Replication package does not match {}", self.arrangement)?;
        for path in &self.missing {
            writeln!(f, "  missing from arrangement: {}", path)?;
        }
        for m in &self.mismatched {
            let expected = m.expected.as_ref().map(|h| h.short()).unwrap_or("-");
            writeln!(f, "  hash mismatch: {} (expected {}, got {})", m.path, expected, m.actual.short())?;
        }
        for path in &self.extra {
            writeln!(f, "  not in package: {}", path)?;
        }
        Ok(())
    }
}

/// Lists produced by [`compare`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discrepancies {
    pub missing: Vec<String>,
    pub mismatched: Vec<HashMismatch>,
    pub extra: Vec<String>,
}

impl Discrepancies {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.extra.is_empty()
    }
}

/// Strip `subpath` from `path`, or `None` if the entry lies outside it.
fn within_subpath<'a>(path: &'a str, subpath: Option<&str>) -> Option<&'a str> {
    match subpath {
        None | Some("") => Some(path),
        Some(prefix) => path
            .strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/')),
    }
}

/// Classify package entries against the recorded `location → hash` map.
pub fn compare(
    mut expected: BTreeMap<String, ContentHash>,
    entries: impl IntoIterator<Item = PackageEntry>,
    subpath: Option<&str>,
) -> Discrepancies {
    let mut result = Discrepancies::default();

    for entry in entries {
        let Some(path) = within_subpath(&entry.path, subpath) else {
            continue;
        };
        if !expected.contains_key(path) {
            result.missing.push(path.to_string());
        }
        let recorded = expected.remove(path);
        if recorded.as_ref() != Some(&entry.hash) {
            result.mismatched.push(HashMismatch {
                path: path.to_string(),
                expected: recorded,
                actual: entry.hash.clone(),
            });
        }
    }

    result.missing.sort();
    result.mismatched.sort_by(|a, b| a.path.cmp(&b.path));
    result.extra = expected.into_keys().collect();
    result
}

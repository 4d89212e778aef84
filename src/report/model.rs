//! Report projection of a declaration

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::digest::ContentHash;
use crate::document::Document;
use crate::error::LedgerResult;
use crate::instant::format_instant;

/// How a location compares with the previous arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationStatus {
    Created,
    Changed,
    Unchanged,
}

/// One row of an arrangement table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLocation {
    pub location: String,
    pub sha256: ContentHash,
    /// Absent for the first arrangement.
    pub status: Option<LocationStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportArrangement {
    pub id: String,
    /// The arrangement comment
    pub name: String,
    /// Sorted by location
    pub artifacts: Vec<ReportLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPerformance {
    pub id: String,
    pub description: String,
    pub started: String,
    pub ended: String,
    /// Name of the accessed arrangement
    pub accessed: Option<String>,
    /// Name of the arrangement it contributed to
    pub contributed: Option<String>,
}

/// Everything a report template can see, exposed as `tro`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportModel {
    pub name: String,
    pub description: String,
    pub creator: String,
    pub date_created: String,
    pub fingerprint: Option<String>,
    pub artifact_count: usize,
    pub trs_description: Option<String>,
    pub arrangements: Vec<ReportArrangement>,
    pub trps: Vec<ReportPerformance>,
    /// Graphviz source of the arrangement/performance flow
    pub workflow_diagram: String,
}

impl ReportModel {
    pub fn from_document(document: &Document) -> LedgerResult<Self> {
        let mut arrangements = Vec::with_capacity(document.arrangements().len());
        let mut previous: Option<BTreeMap<String, ContentHash>> = None;

        for arrangement in document.arrangements() {
            let current = arrangement.path_hash_map(document.composition())?;
            let artifacts = current
                .iter()
                .map(|(location, hash)| ReportLocation {
                    location: location.clone(),
                    sha256: hash.clone(),
                    status: previous.as_ref().map(|prev| match prev.get(location) {
                        None => LocationStatus::Created,
                        Some(old) if old != hash => LocationStatus::Changed,
                        Some(_) => LocationStatus::Unchanged,
                    }),
                })
                .collect();
            arrangements.push(ReportArrangement {
                id: arrangement.id().to_string(),
                name: arrangement.comment().to_string(),
                artifacts,
            });
            previous = Some(current);
        }

        let name_of = |id: crate::ids::ArrangementId| {
            document
                .arrangements()
                .get(id.index())
                .map(|a| a.comment().to_string())
        };
        let trps = document
            .performances()
            .iter()
            .map(|p| ReportPerformance {
                id: p.id().to_string(),
                description: p.comment().to_string(),
                started: format_instant(&p.started_at()),
                ended: format_instant(&p.ended_at()),
                accessed: p.accessed().and_then(name_of),
                contributed: p.contributed().and_then(name_of),
            })
            .collect::<Vec<_>>();

        let workflow_diagram = workflow_dot(&arrangements, &trps);
        Ok(Self {
            name: document.name().to_string(),
            description: document.description().to_string(),
            creator: document.creator().to_string(),
            date_created: document.date_created().to_string(),
            fingerprint: document.composition().fingerprint().map(str::to_string),
            artifact_count: document.composition().len(),
            trs_description: document.profile().description().map(str::to_string),
            arrangements,
            trps,
            workflow_diagram,
        })
    }
}

fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Arrangements as boxes, performances as 3D boxes, edges from the
/// accessed arrangement through the performance to the one it produced.
pub fn workflow_dot(arrangements: &[ReportArrangement], trps: &[ReportPerformance]) -> String {
    let mut dot = String::from("digraph TRO {\n  rankdir=LR;\n  edge [color=black];\n");
    dot.push_str("  node [shape=box, style=\"filled, rounded\", fillcolor=\"#FFFFD1\"];\n");
    for arrangement in arrangements {
        let _ = writeln!(dot, "  {};", quote(&arrangement.name));
    }
    dot.push_str("  node [shape=box3d, style=\"filled, rounded\", fillcolor=\"#D6FDD0\"];\n");
    for trp in trps {
        let node = quote(&trp.description);
        let _ = writeln!(dot, "  {};", node);
        if let Some(accessed) = &trp.accessed {
            let _ = writeln!(dot, "  {} -> {};", quote(accessed), node);
        }
        if let Some(contributed) = &trp.contributed {
            let _ = writeln!(dot, "  {} -> {};", node, quote(contributed));
        }
    }
    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrangement(name: &str) -> ReportArrangement {
        ReportArrangement {
            id: "arrangement/0".into(),
            name: name.into(),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_dot_edges() {
        let trps = vec![ReportPerformance {
            id: "trp/0".into(),
            description: "Run \"model\"".into(),
            started: "2024-01-01T00:00:00Z".into(),
            ended: "2024-01-01T01:00:00Z".into(),
            accessed: Some("before".into()),
            contributed: Some("after".into()),
        }];
        let dot = workflow_dot(&[arrangement("before"), arrangement("after")], &trps);
        assert!(dot.starts_with("digraph TRO {"));
        assert!(dot.contains("\"before\" -> \"Run \\\"model\\\"\";"));
        assert!(dot.contains("\"Run \\\"model\\\"\" -> \"after\";"));
    }

    #[test]
    fn test_dot_without_references() {
        let trps = vec![ReportPerformance {
            id: "trp/0".into(),
            description: "orphan".into(),
            started: String::new(),
            ended: String::new(),
            accessed: None,
            contributed: None,
        }];
        let dot = workflow_dot(&[], &trps);
        assert!(dot.contains("\"orphan\";"));
        assert!(!dot.contains("->"));
    }
}

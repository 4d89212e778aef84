//! The declaration document
//!
//! [`Document`] owns the composition, the arrangements, the performances
//! and the profile snapshot of one Transparent Research Object, and is the
//! only way to mutate them. Every mutating operation validates fully
//! before touching any collection, so a failed call leaves the document
//! exactly as it was.
//!
//! On disk the declaration is JSON-LD: an `@context` and a `@graph` with a
//! single root node.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use trov_vocab::{default_context, node_type, TRO_ID};

use crate::arrangement::{default_comment, Arrangement};
use crate::catalog::Composition;
use crate::digest::ContentHash;
use crate::error::{LedgerError, LedgerResult};
use crate::ids::{ArrangementId, ArtifactId, PerformanceId};
use crate::performance::{build_performance, Performance, PerformanceRequest};
use crate::profile::TrustProfile;
use crate::scan::{hash_path, scan_directory, ScanOptions, ScannedFile};
use crate::sniff::ContentSniffer;
use crate::verify::{compare, read_package, ReplicationReport};

/// Declaration file used when none is given.
pub const DEFAULT_DECLARATION: &str = "some_tro.jsonld";

/// Declaration file and its sealing sidecars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    /// `X.jsonld`
    pub declaration: PathBuf,
    /// `X.sig`
    pub signature: PathBuf,
    /// `X.tsr`
    pub timestamp: PathBuf,
}

impl DocumentPaths {
    pub fn for_declaration(path: impl Into<PathBuf>) -> Self {
        let declaration = path.into();
        Self {
            signature: declaration.with_extension("sig"),
            timestamp: declaration.with_extension("tsr"),
            declaration,
        }
    }
}

impl Default for DocumentPaths {
    fn default() -> Self {
        Self::for_declaration(DEFAULT_DECLARATION)
    }
}

/// Descriptive header of a new declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub creator: String,
    pub name: String,
    pub description: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            creator: "TRO utils".to_string(),
            name: "Some TRO".to_string(),
            description: "Some description".to_string(),
        }
    }
}

fn research_object_types() -> Vec<String> {
    vec![
        node_type::RESEARCH_OBJECT.to_string(),
        node_type::CREATIVE_WORK.to_string(),
    ]
}

/// The `@graph` root node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ResearchObject {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type", default = "research_object_types")]
    node_types: Vec<String>,
    #[serde(rename = "schema:creator", default)]
    creator: String,
    #[serde(rename = "schema:name", default)]
    name: String,
    #[serde(rename = "schema:description", default)]
    description: String,
    #[serde(rename = "schema:dateCreated", default)]
    date_created: String,
    #[serde(rename = "trov:hasArrangement", default)]
    arrangements: Vec<Arrangement>,
    #[serde(rename = "trov:hasAttribute", default)]
    attributes: Vec<Value>,
    #[serde(rename = "trov:hasComposition", default)]
    composition: Composition,
    #[serde(rename = "trov:hasPerformance", default)]
    performances: Vec<Performance>,
    #[serde(rename = "trov:wasAssembledBy", default)]
    assembled_by: TrustProfile,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DeclarationFile {
    #[serde(rename = "@context")]
    context: Vec<Value>,
    #[serde(rename = "@graph")]
    graph: Vec<ResearchObject>,
}

/// One locus referencing an artifact, for usage listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUsage {
    pub arrangement: ArrangementId,
    pub location: String,
}

/// A Transparent Research Object declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    paths: DocumentPaths,
    context: Vec<Value>,
    root: ResearchObject,
}

impl Document {
    /// A new, empty declaration.
    pub fn create(paths: DocumentPaths, metadata: DocumentMetadata, profile: TrustProfile) -> Self {
        let root = ResearchObject {
            id: TRO_ID.to_string(),
            node_types: research_object_types(),
            creator: metadata.creator,
            name: metadata.name,
            description: metadata.description,
            date_created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            arrangements: Vec::new(),
            attributes: Vec::new(),
            composition: Composition::new(),
            performances: Vec::new(),
            assembled_by: profile,
            extra: BTreeMap::new(),
        };
        Self {
            paths,
            context: default_context(),
            root,
        }
    }

    /// Load the declaration if it exists, otherwise start a new one.
    ///
    /// `metadata` and `profile` only apply to a new declaration; an
    /// existing one keeps its recorded header and profile snapshot.
    pub fn open(paths: DocumentPaths, metadata: DocumentMetadata, profile: TrustProfile) -> LedgerResult<Self> {
        if paths.declaration.exists() {
            Self::load(paths)
        } else {
            tracing::debug!(path = %paths.declaration.display(), "Starting new declaration");
            Ok(Self::create(paths, metadata, profile))
        }
    }

    /// Load an existing declaration.
    pub fn load(paths: DocumentPaths) -> LedgerResult<Self> {
        if !paths.declaration.exists() {
            return Err(LedgerError::DeclarationNotFound(paths.declaration.clone()));
        }
        let contents = fs::read_to_string(&paths.declaration)?;
        Self::from_json(paths, &contents)
    }

    /// Parse declaration JSON.
    pub fn from_json(paths: DocumentPaths, json: &str) -> LedgerResult<Self> {
        let file: DeclarationFile =
            serde_json::from_str(json).map_err(|e| LedgerError::MalformedDocument(e.to_string()))?;
        let graph_len = file.graph.len();
        let mut root = file.graph.into_iter().next().ok_or_else(|| {
            LedgerError::MalformedDocument("@graph must contain the research object node".into())
        })?;
        if graph_len > 1 {
            return Err(LedgerError::MalformedDocument(format!(
                "@graph holds {} nodes, expected 1",
                graph_len
            )));
        }
        root.composition.reindex()?;
        Self::check_sequence(root.arrangements.iter().map(Arrangement::id).map(ArrangementId::index), "arrangement")?;
        Self::check_sequence(root.performances.iter().map(Performance::id).map(PerformanceId::index), "performance")?;

        Ok(Self {
            paths,
            context: file.context,
            root,
        })
    }

    fn check_sequence(indices: impl Iterator<Item = usize>, kind: &str) -> LedgerResult<()> {
        for (position, index) in indices.enumerate() {
            if position != index {
                return Err(LedgerError::MalformedDocument(format!(
                    "{} ids are not sequential: position {} holds index {}",
                    kind, position, index
                )));
            }
        }
        Ok(())
    }

    fn to_value(&self) -> LedgerResult<Value> {
        let file = DeclarationFile {
            context: self.context.clone(),
            graph: vec![self.root.clone()],
        };
        Ok(serde_json::to_value(&file)?)
    }

    /// Pretty JSON with sorted keys and two-space indentation.
    pub fn to_json_pretty(&self) -> LedgerResult<String> {
        // serde_json::Value objects are BTreeMaps, so keys come out sorted.
        Ok(serde_json::to_string_pretty(&self.to_value()?)?)
    }

    /// Canonical bytes (RFC 8785 JCS) that are signed and timestamped.
    pub fn canonical_bytes(&self) -> LedgerResult<Vec<u8>> {
        serde_json_canonicalizer::to_vec(&self.to_value()?)
            .map_err(|e| LedgerError::Canonicalization(e.to_string()))
    }

    /// Write the declaration file.
    pub fn save(&self) -> LedgerResult<()> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = self.paths.declaration.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_atomic(&self.paths.declaration, json.as_bytes())?;
        tracing::debug!(path = %self.paths.declaration.display(), "Declaration saved");
        Ok(())
    }

    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    pub fn creator(&self) -> &str {
        &self.root.creator
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    pub fn description(&self) -> &str {
        &self.root.description
    }

    pub fn date_created(&self) -> &str {
        &self.root.date_created
    }

    pub fn composition(&self) -> &Composition {
        &self.root.composition
    }

    pub fn arrangements(&self) -> &[Arrangement] {
        &self.root.arrangements
    }

    pub fn performances(&self) -> &[Performance] {
        &self.root.performances
    }

    pub fn profile(&self) -> &TrustProfile {
        &self.root.assembled_by
    }

    /// Record the signer's public key in the profile snapshot.
    /// Returns true if the document changed.
    pub fn set_public_key(&mut self, key: String) -> bool {
        self.root.assembled_by.set_public_key(key)
    }

    fn arrangement_ids(&self) -> Vec<String> {
        self.root.arrangements.iter().map(|a| a.id().to_string()).collect()
    }

    /// Look up an arrangement by its id string.
    pub fn arrangement(&self, id: &str) -> LedgerResult<&Arrangement> {
        self.root
            .arrangements
            .iter()
            .find(|a| a.id().to_string() == id)
            .ok_or_else(|| LedgerError::ArrangementNotFound {
                id: id.to_string(),
                available: self.arrangement_ids(),
            })
    }

    /// `(id, comment)` for every arrangement, in order.
    pub fn list_arrangements(&self) -> Vec<(ArrangementId, &str)> {
        self.root
            .arrangements
            .iter()
            .map(|a| (a.id(), a.comment()))
            .collect()
    }

    /// `location → content hash` for one arrangement.
    pub fn arrangement_path_hash_map(&self, id: &str) -> LedgerResult<BTreeMap<String, ContentHash>> {
        self.arrangement(id)?.path_hash_map(&self.root.composition)
    }

    /// Ingest a single file or symlink into the catalog.
    pub fn ingest(&mut self, path: &Path, sniffer: &dyn ContentSniffer) -> LedgerResult<ContentHash> {
        let (kind, hash) = hash_path(path)?.ok_or_else(|| {
            LedgerError::Configuration(format!("{} is not a file or symlink", path.display()))
        })?;
        let file = ScannedFile {
            path: path.to_path_buf(),
            location: path.to_string_lossy().into_owned(),
            kind,
            hash: hash.clone(),
        };
        self.root.composition.ingest_batch(&[file], sniffer);
        Ok(hash)
    }

    /// Scan `root`, ingest its content, and append a new arrangement.
    pub fn add_arrangement(
        &mut self,
        root: &Path,
        options: &ScanOptions,
        comment: Option<&str>,
        sniffer: &dyn ContentSniffer,
    ) -> LedgerResult<ArrangementId> {
        let files = scan_directory(root, options)?;
        if options.cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let id = ArrangementId::new(self.root.arrangements.len());
        let artifacts = self.root.composition.ingest_batch(&files, sniffer);
        let comment = comment
            .map(str::to_string)
            .unwrap_or_else(|| default_comment(root));
        let arrangement = Arrangement::from_scan(id, comment, &files, &artifacts);
        self.root.arrangements.push(arrangement);

        tracing::info!(
            %id,
            root = %root.display(),
            loci = files.len(),
            artifacts = self.root.composition.len(),
            "Arrangement added"
        );
        Ok(id)
    }

    /// Validate and append a performance record.
    pub fn add_performance(&mut self, request: PerformanceRequest) -> LedgerResult<PerformanceId> {
        let id = PerformanceId::new(self.root.performances.len());
        let performance = build_performance(
            id,
            request,
            &self.root.arrangements,
            &self.root.assembled_by,
        )?;
        self.root.performances.push(performance);
        tracing::info!(%id, "Performance added");
        Ok(id)
    }

    /// Compare a replication package with a recorded arrangement.
    pub fn verify_replication_package(
        &self,
        arrangement_id: &str,
        package: &Path,
        subpath: Option<&str>,
    ) -> LedgerResult<ReplicationReport> {
        let arrangement = self.arrangement(arrangement_id)?;
        let expected = arrangement.path_hash_map(&self.root.composition)?;
        let entries = read_package(package)?;
        let result = compare(expected, entries, subpath);
        let is_valid = result.is_empty();
        tracing::info!(
            arrangement = %arrangement.id(),
            package = %package.display(),
            is_valid,
            missing = result.missing.len(),
            mismatched = result.mismatched.len(),
            extra = result.extra.len(),
            "Replication package checked"
        );
        Ok(ReplicationReport {
            arrangement: arrangement.id(),
            package: package.to_path_buf(),
            subpath: subpath.map(str::to_string),
            missing: result.missing,
            mismatched: result.mismatched,
            extra: result.extra,
            is_valid,
        })
    }

    /// Every locus that references each artifact.
    pub fn artifact_usage(&self) -> BTreeMap<ArtifactId, Vec<ArtifactUsage>> {
        let mut usage: BTreeMap<ArtifactId, Vec<ArtifactUsage>> = BTreeMap::new();
        for arrangement in &self.root.arrangements {
            for locus in arrangement.loci() {
                usage.entry(locus.artifact()).or_default().push(ArtifactUsage {
                    arrangement: arrangement.id(),
                    location: locus.location().to_string(),
                });
            }
        }
        usage
    }
}

/// Write a file completely or not at all (write-then-rename).
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::StaticSniffer;
    use tempfile::TempDir;

    fn sniffer() -> StaticSniffer {
        StaticSniffer("text/plain".to_string())
    }

    fn new_document(dir: &Path) -> Document {
        Document::create(
            DocumentPaths::for_declaration(dir.join("tro.jsonld")),
            DocumentMetadata::default(),
            TrustProfile::default(),
        )
    }

    #[test]
    fn test_paths_share_base_name() {
        let paths = DocumentPaths::for_declaration("/work/run.jsonld");
        assert_eq!(paths.signature, PathBuf::from("/work/run.sig"));
        assert_eq!(paths.timestamp, PathBuf::from("/work/run.tsr"));
        assert_eq!(DocumentPaths::default().declaration, PathBuf::from("some_tro.jsonld"));
    }

    #[test]
    fn test_new_document_shape() {
        let temp = TempDir::new().unwrap();
        let document = new_document(temp.path());
        let value: Value = serde_json::from_str(&document.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["@context"][0]["trov"], "https://w3id.org/trace/2023/05/trov#");
        let root = &value["@graph"][0];
        assert_eq!(root["@id"], "tro");
        assert_eq!(root["@type"][0], "trov:TransparentResearchObject");
        assert_eq!(root["schema:creator"], "TRO utils");
        assert_eq!(root["trov:hasComposition"]["@id"], "composition/1");
        assert_eq!(root["trov:wasAssembledBy"]["@id"], "trs");
        assert!(root["trov:hasArrangement"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a.txt"), b"a").unwrap();

        let mut document = new_document(temp.path());
        document
            .add_arrangement(&data, &ScanOptions::default(), Some("first"), &sniffer())
            .unwrap();
        document.save().unwrap();

        let loaded = Document::load(document.paths().clone()).unwrap();
        assert_eq!(loaded, document);
        assert_eq!(loaded.canonical_bytes().unwrap(), document.canonical_bytes().unwrap());
    }

    #[test]
    fn test_saved_keys_are_sorted_and_indented() {
        let temp = TempDir::new().unwrap();
        let document = new_document(temp.path());
        document.save().unwrap();
        let text = fs::read_to_string(&document.paths().declaration).unwrap();
        assert!(text.starts_with("{\n  \"@context\""));
        let context = text.find("\"@context\"").unwrap();
        let graph = text.find("\"@graph\"").unwrap();
        assert!(context < graph);
    }

    #[test]
    fn test_load_missing_declaration() {
        let temp = TempDir::new().unwrap();
        let err = Document::load(DocumentPaths::for_declaration(temp.path().join("x.jsonld"))).unwrap_err();
        assert!(matches!(err, LedgerError::DeclarationNotFound(_)));
    }

    #[test]
    fn test_malformed_graph() {
        let err = Document::from_json(
            DocumentPaths::default(),
            r#"{"@context": [], "@graph": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedDocument(_)));
    }

    #[test]
    fn test_canonical_bytes_ignore_formatting() {
        let temp = TempDir::new().unwrap();
        let document = new_document(temp.path());
        let pretty = document.to_json_pretty().unwrap();
        let reparsed = Document::from_json(document.paths().clone(), &pretty).unwrap();
        assert_eq!(reparsed.canonical_bytes().unwrap(), document.canonical_bytes().unwrap());
        assert!(!String::from_utf8(document.canonical_bytes().unwrap()).unwrap().contains('\n'));
    }

    #[test]
    fn test_ingest_single_file_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, b"payload").unwrap();

        let mut document = new_document(temp.path());
        let first = document.ingest(&path, &sniffer()).unwrap();
        let fingerprint = document.composition().fingerprint().map(str::to_string);
        let second = document.ingest(&path, &sniffer()).unwrap();
        assert_eq!(first, second);
        assert_eq!(document.composition().len(), 1);
        assert_eq!(document.composition().fingerprint().map(str::to_string), fingerprint);
    }

    #[test]
    fn test_artifact_usage() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a.txt"), b"same").unwrap();
        fs::write(data.join("b.txt"), b"same").unwrap();

        let mut document = new_document(temp.path());
        document
            .add_arrangement(&data, &ScanOptions::default(), None, &sniffer())
            .unwrap();
        let usage = document.artifact_usage();
        assert_eq!(usage.len(), 1);
        let locations: Vec<_> = usage[&ArtifactId::new(0)].iter().map(|u| u.location.as_str()).collect();
        assert_eq!(locations, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_arrangement_listing_and_lookup() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        fs::create_dir_all(data.join("sub")).unwrap();
        fs::write(data.join("sub/x.txt"), b"x").unwrap();

        let mut document = new_document(temp.path());
        document
            .add_arrangement(&data, &ScanOptions::default(), None, &sniffer())
            .unwrap();
        document
            .add_arrangement(&data, &ScanOptions::default(), Some("again"), &sniffer())
            .unwrap();

        let listed = document.list_arrangements();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1, format!("Scanned {}", data.display()));
        assert_eq!(listed[1], (ArrangementId::new(1), "again"));

        let map = document.arrangement_path_hash_map("arrangement/1").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["sub/x.txt"], crate::digest::sha256_bytes(b"x"));
        assert!(matches!(
            document.arrangement_path_hash_map("arrangement/2"),
            Err(LedgerError::ArrangementNotFound { .. })
        ));
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.sig");
        write_atomic(&path, b"sig").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"sig");
        assert!(!temp.path().join("x.sig.tmp").exists());
    }
}

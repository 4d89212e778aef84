//! Ledger Tests
//!
//! Catalog deduplication, fingerprints, arrangement snapshots, performance
//! validation, persistence and cancellation, driven through `Document`.

mod fixtures;

use std::fs;

use chrono::{TimeZone, Utc};
use fixtures::*;
use serde_json::json;
use tempfile::TempDir;
use tro_ledger::catalog::fingerprint_of;
use tro_ledger::digest::sha256_bytes;
use tro_ledger::document::{Document, DocumentMetadata, DocumentPaths};
use tro_ledger::error::{ErrorKind, LedgerError};
use tro_ledger::performance::PerformanceRequest;
use tro_ledger::profile::TrustProfile;
use tro_ledger::scan::ScanOptions;
use tro_ledger::signal::CancelToken;
use tro_ledger::AttributeKind;

fn hour_request() -> PerformanceRequest {
    PerformanceRequest::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
    )
}

// =============================================================================
// Catalog
// =============================================================================

#[test]
fn test_same_content_is_one_artifact() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");
    write_tree(&first, &[("a.txt", b"shared"), ("b.txt", b"only in first")]);
    write_tree(&second, &[("nested/renamed.txt", b"shared")]);

    let mut document = new_document(temp.path());
    add_dir(&mut document, &first, "first");
    let fingerprint = document.composition().fingerprint().unwrap().to_string();
    add_dir(&mut document, &second, "second");

    assert_eq!(document.composition().len(), 2);
    assert_eq!(document.composition().fingerprint().unwrap(), fingerprint);

    let shared = document.composition().by_hash(&sha256_bytes(b"shared")).unwrap();
    let second_locus = &document.arrangement("arrangement/1").unwrap().loci()[0];
    assert_eq!(second_locus.artifact(), shared.id());
    assert_eq!(second_locus.location(), "nested/renamed.txt");
}

#[test]
fn test_fingerprint_ignores_ingest_order() {
    let temp = TempDir::new().unwrap();
    let one = temp.path().join("one");
    let two = temp.path().join("two");
    write_tree(&one, &[("x", b"x content")]);
    write_tree(&two, &[("y", b"y content"), ("z", b"z content")]);

    let mut forward = new_document(&temp.path().join("f"));
    add_dir(&mut forward, &one, "one");
    add_dir(&mut forward, &two, "two");

    let mut backward = new_document(&temp.path().join("b"));
    add_dir(&mut backward, &two, "two");
    add_dir(&mut backward, &one, "one");

    assert_eq!(
        forward.composition().fingerprint(),
        backward.composition().fingerprint()
    );

    let hashes = [sha256_bytes(b"z content"), sha256_bytes(b"x content"), sha256_bytes(b"y content")];
    assert_eq!(forward.composition().fingerprint().unwrap(), fingerprint_of(&hashes));
}

#[test]
fn test_artifact_ids_follow_first_sighting() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("b.txt", b"b"), ("a.txt", b"a"), ("c.txt", b"b")]);

    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");

    let ids: Vec<_> = document
        .composition()
        .artifacts()
        .iter()
        .map(|a| (a.id().to_string(), a.sha256().clone()))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("composition/1/artifact/0".to_string(), sha256_bytes(b"a")),
            ("composition/1/artifact/1".to_string(), sha256_bytes(b"b")),
        ]
    );
}

// =============================================================================
// Arrangements
// =============================================================================

#[test]
fn test_arrangements_are_immutable_snapshots() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("keep.txt", b"v1")]);

    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "before");
    let snapshot = document.arrangement("arrangement/0").unwrap().clone();

    write_tree(&data, &[("keep.txt", b"v2"), ("new.txt", b"new")]);
    add_dir(&mut document, &data, "after");

    assert_eq!(document.arrangement("arrangement/0").unwrap(), &snapshot);
    assert_eq!(document.arrangements().len(), 2);
    let before = document.arrangement_path_hash_map("arrangement/0").unwrap();
    assert_eq!(before["keep.txt"], sha256_bytes(b"v1"));
    let after = document.arrangement_path_hash_map("arrangement/1").unwrap();
    assert_eq!(after["keep.txt"], sha256_bytes(b"v2"));
    assert_eq!(after.len(), 2);
}

#[test]
fn test_locus_ids_and_order() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("b/2.txt", b"2"), ("a.txt", b"a"), ("b/1.txt", b"1")]);

    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");
    let loci = document.arrangement("arrangement/0").unwrap().loci();

    let seen: Vec<_> = loci.iter().map(|l| (l.id(), l.location())).collect();
    assert_eq!(
        seen,
        vec![
            ("arrangement/0/locus/0", "a.txt"),
            ("arrangement/0/locus/1", "b/1.txt"),
            ("arrangement/0/locus/2", "b/2.txt"),
        ]
    );
}

#[test]
fn test_ignored_directories_are_skipped() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[(".git/HEAD", b"ref"), ("src/main.rs", b"fn main() {}")]);

    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");
    let map = document.arrangement_path_hash_map("arrangement/0").unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["src/main.rs"]);
}

#[test]
fn test_unknown_arrangement_lists_available() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("a", b"a")]);
    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");

    let err = document.arrangement_path_hash_map("arrangement/9").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "Arrangement 'arrangement/9' not found. Available arrangements: [arrangement/0]"
    );
}

// =============================================================================
// Performances
// =============================================================================

#[test]
fn test_performance_with_unknown_arrangement_appends_nothing() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("a", b"a")]);
    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");

    let err = document
        .add_performance(hour_request().accessed("arrangement/0").contributed("arrangement/1"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::ArrangementNotFound { ref id, .. } if id == "arrangement/1"));
    assert!(document.performances().is_empty());
}

#[test]
fn test_capability_must_be_advertised() {
    let temp = TempDir::new().unwrap();
    let mut document = new_document(temp.path());

    let err = document
        .add_performance(hour_request().attribute(AttributeKind::InternetIsolation))
        .unwrap_err();
    assert!(matches!(err, LedgerError::CapabilityNotAdvertised { .. }));
    assert!(document.performances().is_empty());
}

#[test]
fn test_advertised_capability_warrants_attribute() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("in.csv", b"1")]);
    let mut document = new_document_with_profile(temp.path(), isolating_profile());
    add_dir(&mut document, &data, "input");
    add_dir(&mut document, &data, "output");

    let id = document
        .add_performance(
            hour_request()
                .comment("Run analysis")
                .accessed("arrangement/0")
                .contributed("arrangement/1")
                .attribute(AttributeKind::InternetIsolation)
                .extra_field("schema:url", json!("https://example.org/run/1")),
        )
        .unwrap();
    assert_eq!(id.to_string(), "trp/0");

    let json: serde_json::Value = serde_json::from_str(&document.to_json_pretty().unwrap()).unwrap();
    let trp = &json["@graph"][0]["trov:hasPerformance"][0];
    assert_eq!(trp["rdfs:comment"], "Run analysis");
    assert_eq!(trp["trov:wasConductedBy"]["@id"], "trs");
    assert_eq!(trp["trov:accessedArrangement"]["@id"], "arrangement/0");
    assert_eq!(trp["trov:contributedToArrangement"]["@id"], "arrangement/1");
    assert_eq!(trp["trov:startedAtTime"], "2024-03-01T09:00:00Z");
    assert_eq!(trp["schema:url"], "https://example.org/run/1");
    let attribute = &trp["trov:hasPerformanceAttribute"][0];
    assert_eq!(attribute["@id"], "trp/0/attribute/0");
    assert_eq!(attribute["@type"], "trov:InternetIsolation");
    assert_eq!(attribute["trov:warrantedBy"]["@id"], "trs/capability/0");
}

#[test]
fn test_reversed_time_range_rejected() {
    let temp = TempDir::new().unwrap();
    let mut document = new_document(temp.path());
    let request = PerformanceRequest::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    );
    let err = document.add_performance(request).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTimeRange { .. }));
    assert!(document.performances().is_empty());
}

#[test]
fn test_capabilities_come_from_recorded_profile() {
    let temp = TempDir::new().unwrap();
    let paths = DocumentPaths::for_declaration(temp.path().join("tro.jsonld"));
    Document::create(paths.clone(), DocumentMetadata::default(), isolating_profile())
        .save()
        .unwrap();

    // A different profile passed on reopen does not replace the snapshot.
    let mut reopened = Document::open(paths, DocumentMetadata::default(), TrustProfile::default()).unwrap();
    assert!(reopened
        .add_performance(hour_request().attribute(AttributeKind::InternetIsolation))
        .is_ok());
}

// =============================================================================
// Persistence and cancellation
// =============================================================================

#[test]
fn test_round_trip_preserves_everything() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("a.txt", b"a"), ("b/c.txt", b"c")]);

    let mut document = new_document_with_profile(temp.path(), isolating_profile());
    add_dir(&mut document, &data, "input");
    document
        .add_performance(hour_request().accessed("arrangement/0").attribute(AttributeKind::InternetIsolation))
        .unwrap();
    assert!(document.set_public_key(FAKE_PUBLIC_KEY.to_string()));
    document.save().unwrap();

    let loaded = Document::load(document.paths().clone()).unwrap();
    assert_eq!(loaded, document);
    assert_eq!(loaded.canonical_bytes().unwrap(), document.canonical_bytes().unwrap());
    assert_eq!(loaded.profile().public_key(), Some(FAKE_PUBLIC_KEY));

    // Appending after reload continues the id sequences.
    let mut loaded = loaded;
    let id = add_dir(&mut loaded, &data, "again");
    assert_eq!(id, "arrangement/1");
    assert_eq!(loaded.composition().len(), 2);
}

#[test]
fn test_unknown_fields_survive_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tro.jsonld");
    let declaration = json!({
        "@context": [{"trov": "https://w3id.org/trace/2023/05/trov#"}],
        "@graph": [{
            "@id": "tro",
            "@type": ["trov:TransparentResearchObject", "schema:CreativeWork"],
            "schema:name": "Imported",
            "schema:license": "CC-BY-4.0",
            "trov:wasAssembledBy": {"@id": "trs", "schema:name": "Lab TRS"}
        }]
    });
    fs::write(&path, serde_json::to_string(&declaration).unwrap()).unwrap();

    let document = Document::load(DocumentPaths::for_declaration(&path)).unwrap();
    assert_eq!(document.name(), "Imported");
    let value: serde_json::Value = serde_json::from_str(&document.to_json_pretty().unwrap()).unwrap();
    assert_eq!(value["@graph"][0]["schema:license"], "CC-BY-4.0");
    assert_eq!(value["@graph"][0]["trov:wasAssembledBy"]["schema:name"], "Lab TRS");
}

#[test]
fn test_cancelled_scan_leaves_document_unmodified() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("a.txt", b"a"), ("b.txt", b"b")]);

    let mut document = new_document(temp.path());
    let before = document.clone();

    let cancel = CancelToken::new();
    cancel.cancel();
    let options = ScanOptions::default().with_cancel(cancel);
    let err = document
        .add_arrangement(&data, &options, None, &sniffer())
        .unwrap_err();

    assert!(matches!(err, LedgerError::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(document, before);
}

#[test]
fn test_missing_directory_leaves_document_unmodified() {
    let temp = TempDir::new().unwrap();
    let mut document = new_document(temp.path());
    let before = document.clone();
    assert!(document
        .add_arrangement(&temp.path().join("absent"), &ScanOptions::default(), None, &sniffer())
        .is_err());
    assert_eq!(document, before);
}

#[cfg(unix)]
#[test]
fn test_symlinks_recorded_not_followed() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    write_tree(&data, &[("real.txt", b"real")]);
    std::os::unix::fs::symlink("real.txt", data.join("link.txt")).unwrap();

    let mut document = new_document(temp.path());
    add_dir(&mut document, &data, "data");

    let map = document.arrangement_path_hash_map("arrangement/0").unwrap();
    assert!(map["link.txt"].is_symlink_marker());
    let link_artifact = document.composition().by_hash(&map["link.txt"]).unwrap();
    assert_eq!(link_artifact.mime_type(), "inode/symlink");
}

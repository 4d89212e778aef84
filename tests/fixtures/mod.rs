//! Shared helpers for integration tests
//!
//! Directory trees, archive builders, and in-process stand-ins for the
//! signer and the timestamp authority.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tro_ledger::digest::{sha256_bytes, sha512_hex};
use tro_ledger::document::{Document, DocumentMetadata, DocumentPaths};
use tro_ledger::profile::TrustProfile;
use tro_ledger::scan::ScanOptions;
use tro_ledger::seal::{AuthorityCertificates, AuthorityError, Signer, SignerError, TimestampAuthority};
use tro_ledger::sniff::StaticSniffer;
use walkdir::WalkDir;

/// Write `(relative path, content)` pairs under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// The three-file tree used by the replication scenarios.
pub fn sample_tree(root: &Path) {
    write_tree(
        root,
        &[
            ("input.csv", b"a,b\n1,2\n"),
            ("scripts/run.sh", b"#!/bin/sh\necho run\n"),
            ("output/result.txt", b"42\n"),
        ],
    );
}

pub fn sniffer() -> StaticSniffer {
    StaticSniffer("text/plain".to_string())
}

pub fn new_document(dir: &Path) -> Document {
    new_document_with_profile(dir, TrustProfile::default())
}

pub fn new_document_with_profile(dir: &Path, profile: TrustProfile) -> Document {
    Document::create(
        DocumentPaths::for_declaration(dir.join("tro.jsonld")),
        DocumentMetadata::default(),
        profile,
    )
}

/// Profile advertising internet isolation only.
pub fn isolating_profile() -> TrustProfile {
    TrustProfile::from_json(
        r#"{
            "schema:name": "Test TRS",
            "trov:hasCapability": [
                {"@id": "trs/capability/0", "@type": "trov:CanProvideInternetIsolation"}
            ]
        }"#,
    )
    .unwrap()
}

pub fn add_dir(document: &mut Document, dir: &Path, comment: &str) -> String {
    document
        .add_arrangement(dir, &ScanOptions::default(), Some(comment), &sniffer())
        .unwrap()
        .to_string()
}

fn files_under(dir: &Path) -> Vec<(String, std::path::PathBuf)> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, e.path().to_path_buf())
        })
        .collect()
}

/// Zip every regular file under `dir`, with an explicit directory member.
pub fn zip_dir(dir: &Path, out: &Path) {
    let mut writer = zip::ZipWriter::new(File::create(out).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    writer.add_directory("scripts/", options).unwrap();
    for (rel, path) in files_under(dir) {
        writer.start_file(rel, options).unwrap();
        writer.write_all(&fs::read(path).unwrap()).unwrap();
    }
    writer.finish().unwrap();
}

/// Gzipped tar of every regular file under `dir`.
pub fn tar_gz_dir(dir: &Path, out: &Path) {
    let encoder = flate2::write::GzEncoder::new(File::create(out).unwrap(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (rel, path) in files_under(dir) {
        builder.append_path_with_name(&path, rel).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Deterministic signer: the signature is derived from the data.
pub struct FakeSigner;

pub const FAKE_PUBLIC_KEY: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\nfake\n-----END PGP PUBLIC KEY BLOCK-----\n";

impl Signer for FakeSigner {
    fn sign(&self, data: &[u8], key_id: &str, _passphrase: &str) -> Result<Vec<u8>, SignerError> {
        Ok(format!("SIG {} {}", key_id, sha256_bytes(data)).into_bytes())
    }

    fn export_public_key(&self, _key_id: &str) -> Result<String, SignerError> {
        Ok(FAKE_PUBLIC_KEY.to_string())
    }
}

/// [`FakeSigner`] that counts how often it is contacted.
#[derive(Default)]
pub struct CountingSigner {
    pub signs: Cell<usize>,
    pub exports: Cell<usize>,
}

impl CountingSigner {
    pub fn calls(&self) -> usize {
        self.signs.get() + self.exports.get()
    }
}

impl Signer for CountingSigner {
    fn sign(&self, data: &[u8], key_id: &str, passphrase: &str) -> Result<Vec<u8>, SignerError> {
        self.signs.set(self.signs.get() + 1);
        FakeSigner.sign(data, key_id, passphrase)
    }

    fn export_public_key(&self, key_id: &str) -> Result<String, SignerError> {
        self.exports.set(self.exports.get() + 1);
        FakeSigner.export_public_key(key_id)
    }
}

/// Authority whose token is a digest of the payload.
#[derive(Default)]
pub struct FakeAuthority {
    pub unreachable: bool,
    pub requests: Cell<usize>,
}

impl FakeAuthority {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            requests: Cell::new(0),
        }
    }
}

impl TimestampAuthority for FakeAuthority {
    fn request_timestamp(&self, payload: &[u8]) -> Result<Vec<u8>, AuthorityError> {
        self.requests.set(self.requests.get() + 1);
        if self.unreachable {
            return Err(AuthorityError::EmptyResponse {
                url: "https://tsa.invalid/tsr".to_string(),
            });
        }
        Ok(sha512_hex(payload).into_bytes())
    }

    fn fetch_certificates(&self) -> Result<AuthorityCertificates, AuthorityError> {
        if self.unreachable {
            return Err(AuthorityError::EmptyResponse {
                url: "https://tsa.invalid/tsa.crt".to_string(),
            });
        }
        Ok(AuthorityCertificates {
            tsa_cert: b"tsa".to_vec(),
            ca_cert: b"ca".to_vec(),
        })
    }

    fn verify_token(
        &self,
        payload: &[u8],
        token: &[u8],
        _certificates: &AuthorityCertificates,
    ) -> Result<(), AuthorityError> {
        if sha512_hex(payload).as_bytes() == token {
            Ok(())
        } else {
            Err(AuthorityError::VerificationFailed("message imprint mismatch".to_string()))
        }
    }
}

//! Replication package readers
//!
//! A package is a directory, a zip archive, or a tar archive (optionally
//! gzip-compressed). Each reader yields `(path, content hash)` pairs with
//! `/`-separated paths relative to the package root.

use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::digest::{sha256_reader, ContentHash};
use crate::scan::{hash_path, relative_location, ScanError};

/// Errors reading a replication package
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Replication package not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported package format: {0} (expected a directory, .zip, .tar, .tar.gz or .tgz)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read zip archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read tar archive {path}: {source}")]
    Tar {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One file inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub path: String,
    pub hash: ContentHash,
}

/// Package container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Directory,
    Zip,
    Tar,
    TarGz,
}

impl PackageKind {
    /// Detect the format from the file name, then from leading magic bytes.
    pub fn detect(path: &Path) -> Result<Self, PackageError> {
        if path.is_dir() {
            return Ok(Self::Directory);
        }
        if !path.exists() {
            return Err(PackageError::NotFound(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            return Ok(Self::Zip);
        }
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Ok(Self::TarGz);
        }
        if name.ends_with(".tar") {
            return Ok(Self::Tar);
        }

        let mut head = [0u8; 262];
        let n = read_prefix(File::open(path)?, &mut head)?;
        let head = &head[..n];
        if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
            Ok(Self::Zip)
        } else if head.starts_with(&[0x1f, 0x8b]) {
            Ok(Self::TarGz)
        } else if head.len() >= 262 && &head[257..262] == b"ustar" {
            Ok(Self::Tar)
        } else {
            Err(PackageError::UnsupportedFormat(path.to_path_buf()))
        }
    }
}

fn read_prefix<R: Read>(mut reader: R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Enumerate and hash every file in a package.
pub fn read_package(path: &Path) -> Result<Vec<PackageEntry>, PackageError> {
    let kind = PackageKind::detect(path)?;
    tracing::debug!(package = %path.display(), ?kind, "Reading replication package");
    match kind {
        PackageKind::Directory => read_directory(path),
        PackageKind::Zip => read_zip(path),
        PackageKind::Tar => read_tar(path, BufReader::new(File::open(path)?)),
        PackageKind::TarGz => read_tar(path, GzDecoder::new(BufReader::new(File::open(path)?))),
    }
}

fn read_directory(root: &Path) -> Result<Vec<PackageEntry>, PackageError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| PackageError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.file_type().is_symlink() && entry.path().is_dir() {
            continue;
        }
        if let Some((_, hash)) = hash_path(entry.path())? {
            entries.push(PackageEntry {
                path: relative_location(root, entry.path())?,
                hash,
            });
        }
    }
    Ok(entries)
}

fn read_zip(path: &Path) -> Result<Vec<PackageEntry>, PackageError> {
    let zip_err = |source| PackageError::Zip {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?)).map_err(zip_err)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(zip_err)?;
        if member.is_dir() {
            continue;
        }
        let name = normalize_member_name(member.name());
        let hash = sha256_reader(&mut member)?;
        entries.push(PackageEntry { path: name, hash });
    }
    Ok(entries)
}

fn read_tar<R: Read>(path: &Path, reader: R) -> Result<Vec<PackageEntry>, PackageError> {
    let tar_err = |source| PackageError::Tar {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = tar::Archive::new(reader);
    let mut entries = Vec::new();
    // Hard links carry no data; they resolve to an earlier member's hash.
    let mut seen: HashMap<String, ContentHash> = HashMap::new();

    for member in archive.entries().map_err(tar_err)? {
        let mut member = member.map_err(tar_err)?;
        let name = normalize_member_name(&member.path().map_err(tar_err)?.to_string_lossy());
        let hash = match member.header().entry_type() {
            tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
                sha256_reader(&mut member).map_err(tar_err)?
            }
            tar::EntryType::Symlink => ContentHash::symlink(),
            tar::EntryType::Link => {
                let target = member
                    .link_name()
                    .map_err(tar_err)?
                    .map(|t| normalize_member_name(&t.to_string_lossy()));
                match target.and_then(|t| seen.get(&t).cloned()) {
                    Some(hash) => hash,
                    None => {
                        tracing::debug!(member = %name, "Skipping hard link to unknown member");
                        continue;
                    }
                }
            }
            _ => continue,
        };
        seen.insert(name.clone(), hash.clone());
        entries.push(PackageEntry { path: name, hash });
    }
    Ok(entries)
}

/// Strip a leading `./` and any trailing `/`, and use `/` separators.
fn normalize_member_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let mut trimmed = name.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_end_matches('/').to_string()
}

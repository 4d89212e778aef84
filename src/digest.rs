//! Content digests
//!
//! SHA-256 content hashes (streamed in fixed-size chunks) and the SHA-512
//! digests used by the sealing chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size for streaming hashes.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a file's content.
///
/// The empty string is the marker recorded for symlinks, whose targets
/// are never read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

/// A string that is neither 64 lowercase hex digits nor the symlink marker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SHA-256 digest: '{0}'")]
pub struct InvalidHash(pub String);

impl ContentHash {
    /// Marker hash for symlinks.
    pub fn symlink() -> Self {
        Self(String::new())
    }

    /// Parse a hex digest, accepting upper case input.
    pub fn from_hex(hex_digest: &str) -> Result<Self, InvalidHash> {
        if hex_digest.is_empty() {
            return Ok(Self::symlink());
        }
        if hex_digest.len() != 64 || !hex_digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidHash(hex_digest.to_string()));
        }
        Ok(Self(hex_digest.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_symlink_marker(&self) -> bool {
        self.0.is_empty()
    }

    /// Leading 12 hex digits, for human-readable output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = InvalidHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Hash everything a reader yields, one chunk at a time.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a regular file's content.
pub fn sha256_file(path: &Path) -> io::Result<ContentHash> {
    sha256_reader(File::open(path)?)
}

/// Hash an in-memory buffer.
pub fn sha256_bytes(data: &[u8]) -> ContentHash {
    ContentHash(hex::encode(Sha256::digest(data)))
}

/// Hex-encoded SHA-512 of a buffer.
pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

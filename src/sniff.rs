//! MIME type detection for ingested artifacts

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::process::{run_with_timeout, ProcessError};

/// Errors from a content sniffer
#[derive(Debug, thiserror::Error)]
pub enum SniffError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("no MIME type reported for {0}")]
    Empty(PathBuf),
}

/// Reports the MIME type of a file's content.
pub trait ContentSniffer: Send + Sync {
    fn detect_mime_type(&self, path: &Path) -> Result<String, SniffError>;
}

/// Sniffer backed by `file --brief --mime-type`.
#[derive(Debug, Clone)]
pub struct FileCommandSniffer {
    binary: PathBuf,
    timeout: Duration,
}

impl FileCommandSniffer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for FileCommandSniffer {
    fn default() -> Self {
        Self::new("file", Duration::from_secs(30))
    }
}

impl ContentSniffer for FileCommandSniffer {
    fn detect_mime_type(&self, path: &Path) -> Result<String, SniffError> {
        let mut command = Command::new(&self.binary);
        command.args(["--brief", "--mime-type", "--"]).arg(path);
        let output = run_with_timeout(command, None, self.timeout)?.check()?;
        let mime = output.stdout_lossy().trim().to_string();
        if mime.is_empty() {
            return Err(SniffError::Empty(path.to_path_buf()));
        }
        Ok(mime)
    }
}

/// Sniffer that reports the same type for every file.
#[derive(Debug, Clone)]
pub struct StaticSniffer(pub String);

impl ContentSniffer for StaticSniffer {
    fn detect_mime_type(&self, _path: &Path) -> Result<String, SniffError> {
        Ok(self.0.clone())
    }
}

/// Detect a MIME type, falling back to `application/octet-stream` when
/// the sniffer fails or reports nothing.
pub fn mime_type_or_fallback(sniffer: &dyn ContentSniffer, path: &Path) -> String {
    match sniffer.detect_mime_type(path) {
        Ok(mime) if !mime.trim().is_empty() => mime.trim().to_string(),
        Ok(_) => trov_vocab::FALLBACK_MIME_TYPE.to_string(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "MIME detection failed, using fallback");
            trov_vocab::FALLBACK_MIME_TYPE.to_string()
        }
    }
}

//! Detached signatures
//!
//! [`GpgSigner`] drives the `gpg` binary non-interactively: the passphrase
//! goes in on stdin, the document is read from a scratch file, and the
//! ASCII-armored signature comes back on stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::process::{run_with_timeout, ProcessError};

/// Errors from a signer
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("signer produced an empty signature")]
    EmptySignature,

    #[error("no public key found for '{0}'")]
    KeyNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces detached signatures and exports public keys.
pub trait Signer {
    fn sign(&self, data: &[u8], key_id: &str, passphrase: &str) -> Result<Vec<u8>, SignerError>;

    /// ASCII-armored public key for `key_id`.
    fn export_public_key(&self, key_id: &str) -> Result<String, SignerError>;
}

/// Signer backed by GnuPG.
#[derive(Debug, Clone)]
pub struct GpgSigner {
    binary: PathBuf,
    home: Option<PathBuf>,
    timeout: Duration,
}

impl GpgSigner {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            home: None,
            timeout,
        }
    }

    /// Use a specific keyring directory (`--homedir`).
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("--batch");
        if let Some(home) = &self.home {
            command.arg("--homedir").arg(home);
        }
        command
    }
}

impl Signer for GpgSigner {
    fn sign(&self, data: &[u8], key_id: &str, passphrase: &str) -> Result<Vec<u8>, SignerError> {
        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(data)?;
        input.flush()?;

        let mut command = self.command();
        command
            .args(["--yes", "--pinentry-mode", "loopback", "--passphrase-fd", "0"])
            .args(["--armor", "--detach-sign", "--local-user", key_id])
            .args(["--output", "-"])
            .arg(input.path());

        let stdin = format!("{}\n", passphrase);
        let output = run_with_timeout(command, Some(stdin.as_bytes()), self.timeout)?.check()?;
        if output.stdout.is_empty() {
            return Err(SignerError::EmptySignature);
        }
        tracing::debug!(key_id, bytes = output.stdout.len(), "Produced detached signature");
        Ok(output.stdout)
    }

    fn export_public_key(&self, key_id: &str) -> Result<String, SignerError> {
        let mut command = self.command();
        command.args(["--armor", "--export", key_id]);
        let output = run_with_timeout(command, None, self.timeout)?.check()?;
        let key = output.stdout_lossy();
        if key.trim().is_empty() {
            return Err(SignerError::KeyNotFound(key_id.to_string()));
        }
        Ok(key)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_gpg_binary() {
        let signer = GpgSigner::new("no-such-gpg-binary-tro", Duration::from_secs(1));
        let err = signer.sign(b"doc", "KEY", "pass").unwrap_err();
        assert!(matches!(err, SignerError::Process(ProcessError::Spawn { .. })));
    }

    #[test]
    fn test_home_dir_is_passed() {
        let signer = GpgSigner::new("gpg", Duration::from_secs(1)).with_home(Some("/keys".into()));
        let command = signer.command();
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--batch", "--homedir", "/keys"]);
    }
}

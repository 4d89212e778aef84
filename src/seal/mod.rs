//! Sealing chain
//!
//! A declaration moves through `Unsigned → Signed → Timestamped`. The
//! signature is a detached signature over the canonical document bytes.
//! The timestamp covers a payload that binds the document and the
//! signature together by their SHA-512 digests, so a token can only
//! verify against the exact document and signature it was issued for.
//!
//! State lives in sidecar files next to the declaration (`X.sig`,
//! `X.tsr`). A step either writes its sidecar completely or leaves every
//! sidecar as it was.

pub mod signer;
pub mod timestamp;

pub use signer::{GpgSigner, Signer, SignerError};
pub use timestamp::{
    AuthorityCertificates, AuthorityEndpoints, AuthorityError, HttpTimestampAuthority,
    TimestampAuthority,
};

use serde::Serialize;
use std::fmt;
use std::fs;

use crate::digest::sha512_hex;
use crate::document::{write_atomic, Document, DocumentPaths};
use crate::error::{LedgerError, LedgerResult};

/// Progress through the sealing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SealState {
    Unsigned,
    Signed,
    Timestamped,
}

impl fmt::Display for SealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SealState::Unsigned => "unsigned",
            SealState::Signed => "signed",
            SealState::Timestamped => "timestamped",
        })
    }
}

/// Key material for signing, as configured.
#[derive(Debug, Clone, Default)]
pub struct SigningKey {
    pub key_id: Option<String>,
    pub passphrase: Option<String>,
}

impl SigningKey {
    /// Key id and passphrase, or a configuration error naming the missing one.
    pub fn require(&self) -> LedgerResult<(&str, &str)> {
        let key_id = self
            .key_id
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LedgerError::Configuration("GPG key id (fingerprint) was not provided".into()))?;
        let passphrase = self
            .passphrase
            .as_deref()
            .ok_or_else(|| LedgerError::Configuration("GPG passphrase was not provided".into()))?;
        Ok((key_id, passphrase))
    }
}

#[derive(Serialize)]
struct TimestampPayload {
    tro_declaration: String,
    trs_signature: String,
}

/// Canonical payload submitted to the timestamp authority.
pub fn timestamp_payload(canonical_document: &[u8], signature: &[u8]) -> LedgerResult<Vec<u8>> {
    let payload = TimestampPayload {
        tro_declaration: sha512_hex(canonical_document),
        trs_signature: sha512_hex(signature),
    };
    serde_json_canonicalizer::to_vec(&payload).map_err(|e| LedgerError::Canonicalization(e.to_string()))
}

/// Tracks the seal of one declaration across sign and timestamp steps.
#[derive(Debug)]
pub struct SealingSession {
    paths: DocumentPaths,
    state: SealState,
    signature: Option<Vec<u8>>,
}

impl SealingSession {
    /// Pick up where earlier runs left off, based on the sidecars present.
    pub fn resume(paths: DocumentPaths) -> LedgerResult<Self> {
        let signature = if paths.signature.exists() {
            Some(fs::read(&paths.signature)?)
        } else {
            None
        };
        let state = match (&signature, paths.timestamp.exists()) {
            (None, _) => SealState::Unsigned,
            (Some(_), false) => SealState::Signed,
            (Some(_), true) => SealState::Timestamped,
        };
        tracing::debug!(%state, declaration = %paths.declaration.display(), "Resumed sealing session");
        Ok(Self {
            paths,
            state,
            signature,
        })
    }

    pub fn state(&self) -> SealState {
        self.state
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Sign the canonical document and persist `X.sig`.
    ///
    /// Any earlier timestamp token no longer matches and is removed.
    pub fn sign(&mut self, document: &Document, signer: &dyn Signer, key: &SigningKey) -> LedgerResult<()> {
        let (key_id, passphrase) = key.require()?;
        let canonical = document.canonical_bytes()?;
        let signature = signer.sign(&canonical, key_id, passphrase)?;

        write_atomic(&self.paths.signature, &signature)?;
        if self.paths.timestamp.exists() {
            fs::remove_file(&self.paths.timestamp)?;
            tracing::info!(path = %self.paths.timestamp.display(), "Removed stale timestamp token");
        }
        tracing::info!(path = %self.paths.signature.display(), key_id, "Declaration signed");

        self.signature = Some(signature);
        self.state = SealState::Signed;
        Ok(())
    }

    /// Obtain a timestamp over document and signature and persist `X.tsr`.
    pub fn timestamp(&mut self, document: &Document, authority: &dyn TimestampAuthority) -> LedgerResult<()> {
        let signature = match (self.state, &self.signature) {
            (SealState::Unsigned, _) | (_, None) => return Err(LedgerError::NotSigned),
            (_, Some(signature)) => signature,
        };
        let payload = timestamp_payload(&document.canonical_bytes()?, signature)?;
        let token = authority.request_timestamp(&payload)?;

        write_atomic(&self.paths.timestamp, &token)?;
        tracing::info!(path = %self.paths.timestamp.display(), bytes = token.len(), "Timestamp recorded");
        self.state = SealState::Timestamped;
        Ok(())
    }
}

/// Embed the signer's public key in the declaration and sign it.
///
/// Key material is checked before the signer is contacted, so a missing
/// key id or passphrase leaves the declaration and its sidecars untouched.
pub fn sign_document(document: &mut Document, signer: &dyn Signer, key: &SigningKey) -> LedgerResult<SealingSession> {
    let (key_id, _) = key.require()?;
    let public_key = signer.export_public_key(key_id)?;
    if document.set_public_key(public_key) {
        document.save()?;
    }
    let mut session = SealingSession::resume(document.paths().clone())?;
    session.sign(document, signer, key)?;
    Ok(session)
}

/// Where a seal check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Certificates,
    Token,
}

/// Outcome of checking a timestamped declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealVerification {
    Verified,
    Failed { stage: VerificationStage, reason: String },
}

impl SealVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, SealVerification::Verified)
    }
}

/// Rebuild the payload from the current document and persisted signature
/// and check the persisted token against it.
///
/// Missing sidecars are errors. Anything that goes wrong once both are
/// present is reported as a failed verification.
pub fn verify_timestamp(document: &Document, authority: &dyn TimestampAuthority) -> LedgerResult<SealVerification> {
    let paths = document.paths();
    if !paths.signature.exists() {
        return Err(LedgerError::SignatureMissing(paths.signature.clone()));
    }
    if !paths.timestamp.exists() {
        return Err(LedgerError::TimestampMissing(paths.timestamp.clone()));
    }
    let signature = fs::read(&paths.signature)?;
    let token = fs::read(&paths.timestamp)?;
    let payload = timestamp_payload(&document.canonical_bytes()?, &signature)?;

    let certificates = match authority.fetch_certificates() {
        Ok(certificates) => certificates,
        Err(e) => {
            tracing::warn!(error = %e, "Could not fetch authority certificates");
            return Ok(SealVerification::Failed {
                stage: VerificationStage::Certificates,
                reason: e.to_string(),
            });
        }
    };

    match authority.verify_token(&payload, &token, &certificates) {
        Ok(()) => {
            tracing::info!(declaration = %paths.declaration.display(), "Timestamp verified");
            Ok(SealVerification::Verified)
        }
        Err(e) => Ok(SealVerification::Failed {
            stage: VerificationStage::Token,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = timestamp_payload(b"doc", b"sig").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["tro_declaration"], sha512_hex(b"doc"));
        assert_eq!(value["trs_signature"], sha512_hex(b"sig"));
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with("{\"tro_declaration\":"));
        assert!(!text.contains(' '));
    }

    #[test]
    fn test_payload_changes_with_either_input() {
        let base = timestamp_payload(b"doc", b"sig").unwrap();
        assert_ne!(base, timestamp_payload(b"doc2", b"sig").unwrap());
        assert_ne!(base, timestamp_payload(b"doc", b"sig2").unwrap());
    }

    #[test]
    fn test_signing_key_required() {
        let missing_key = SigningKey {
            key_id: None,
            passphrase: Some("p".into()),
        };
        assert!(matches!(missing_key.require(), Err(LedgerError::Configuration(_))));
        let missing_pass = SigningKey {
            key_id: Some("ABC".into()),
            passphrase: None,
        };
        assert!(matches!(missing_pass.require(), Err(LedgerError::Configuration(_))));
    }

    #[test]
    fn test_state_order() {
        assert!(SealState::Unsigned < SealState::Signed);
        assert!(SealState::Signed < SealState::Timestamped);
        assert_eq!(SealState::Timestamped.to_string(), "timestamped");
    }
}

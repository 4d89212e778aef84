//! Document-level error taxonomy
//!
//! Every fallible ledger operation returns [`LedgerError`]. Module-specific
//! errors (scan, package, signer, authority, report) convert into it so a
//! caller can classify any failure with [`LedgerError::kind`].

use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::report::ReportError;
use crate::scan::ScanError;
use crate::seal::{AuthorityError, SignerError};
use crate::verify::PackageError;

/// Coarse classification used for reporting and CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced id or required file does not exist.
    NotFound,
    /// A required setting is missing or invalid.
    Configuration,
    /// The caller supplied values that violate an invariant.
    InvalidInput,
    /// Signer, timestamp authority or network failure.
    ExternalService,
    /// Local filesystem or encoding failure.
    Io,
    /// The operation was interrupted by a cancellation signal.
    Cancelled,
}

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Arrangement '{id}' not found. Available arrangements: [{}]", .available.join(", "))]
    ArrangementNotFound { id: String, available: Vec<String> },

    #[error("Artifact '{0}' referenced by the arrangement is not in the composition")]
    ArtifactNotFound(String),

    #[error("Declaration file not found: {0}")]
    DeclarationNotFound(PathBuf),

    #[error("Signature file does not exist: {0}")]
    SignatureMissing(PathBuf),

    #[error("Timestamp file does not exist: {0}")]
    TimestampMissing(PathBuf),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Performance ends before it starts ({started_at} > {ended_at})")]
    InvalidTimeRange { started_at: String, ended_at: String },

    #[error("{0}")]
    UnknownAttribute(#[from] trov_vocab::ParseKindError),

    #[error("Attribute {attribute} requires capability {capability}, which the trusted system does not advertise")]
    CapabilityNotAdvertised {
        attribute: trov_vocab::AttributeKind,
        capability: trov_vocab::CapabilityKind,
    },

    #[error("Cannot timestamp an unsigned document; sign it first")]
    NotSigned,

    #[error("Malformed declaration: {0}")]
    MalformedDocument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Scan(ScanError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("Signer failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Timestamp authority failed: {0}")]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    Canonicalization(String),
}

impl From<ScanError> for LedgerError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Cancelled => LedgerError::Cancelled,
            other => LedgerError::Scan(other),
        }
    }
}

impl LedgerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArrangementNotFound { .. }
            | Self::ArtifactNotFound(_)
            | Self::DeclarationNotFound(_)
            | Self::SignatureMissing(_)
            | Self::TimestampMissing(_) => ErrorKind::NotFound,
            Self::Configuration(_) | Self::Config(_) => ErrorKind::Configuration,
            Self::InvalidTimeRange { .. }
            | Self::UnknownAttribute(_)
            | Self::CapabilityNotAdvertised { .. }
            | Self::NotSigned
            | Self::MalformedDocument(_) => ErrorKind::InvalidInput,
            Self::Signer(_) | Self::Authority(_) => ErrorKind::ExternalService,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Scan(_)
            | Self::Package(_)
            | Self::Report(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Canonicalization(_) => ErrorKind::Io,
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

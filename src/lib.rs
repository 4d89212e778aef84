//! TRO Ledger - Transparent Research Object provenance ledger
//!
//! Records which files a computation read and produced, as content-addressed
//! snapshots in a JSON-LD declaration, and seals the declaration with a
//! detached signature and an RFC 3161 timestamp.

pub mod arrangement;
pub mod catalog;
pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod ids;
pub mod instant;
pub mod performance;
pub mod process;
pub mod profile;
pub mod report;
pub mod scan;
pub mod seal;
pub mod signal;
pub mod sniff;
pub mod timeout;
pub mod verify;

pub use arrangement::{Arrangement, Locus};
pub use catalog::{Artifact, Composition};
pub use config::{EffectiveConfig, LedgerConfig};
pub use digest::ContentHash;
pub use document::{Document, DocumentMetadata, DocumentPaths};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ids::{ArrangementId, ArtifactId, PerformanceId};
pub use performance::{Performance, PerformanceRequest};
pub use profile::TrustProfile;
pub use report::{ReportModel, ReportRenderer, TemplateRenderer};
pub use scan::ScanOptions;
pub use seal::{SealState, SealVerification, SealingSession, Signer, SigningKey, TimestampAuthority};
pub use signal::{CancelToken, SignalHandler};
pub use sniff::ContentSniffer;
pub use verify::ReplicationReport;
pub use trov_vocab::{AttributeKind, CapabilityKind};

//! TROV Vocabulary
//!
//! Names shared by everything that reads or writes a Transparent Research
//! Object declaration: the JSON-LD context, node type identifiers, and the
//! performance-attribute / system-capability pairing.

pub mod capability;
pub mod context;

pub use capability::{AttributeKind, CapabilityKind, ParseKindError, CAPABILITY_MAPPING};
pub use context::{default_context, node_type};

/// Composition id used by every declaration (a TRO has exactly one composition).
pub const COMPOSITION_ID: &str = "composition/1";

/// Id of the root research object node.
pub const TRO_ID: &str = "tro";

/// Id of the trusted research system node.
pub const TRS_ID: &str = "trs";

/// Id of the composition fingerprint node.
pub const FINGERPRINT_ID: &str = "fingerprint";

/// MIME type recorded for symlinks, which are never dereferenced.
pub const SYMLINK_MIME_TYPE: &str = "inode/symlink";

/// MIME type used when content sniffing yields nothing.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

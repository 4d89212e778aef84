//! JSON-LD context and node type names.

use serde_json::{json, Value};

/// RDF namespace.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// RDF Schema namespace.
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// TROV namespace.
pub const TROV_NS: &str = "https://w3id.org/trace/2023/05/trov#";

/// schema.org namespace.
pub const SCHEMA_NS: &str = "https://schema.org";

/// Build the `@context` array written into new declarations.
pub fn default_context() -> Vec<Value> {
    vec![json!({
        "rdf": RDF_NS,
        "rdfs": RDFS_NS,
        "trov": TROV_NS,
        "schema": SCHEMA_NS,
    })]
}

/// `@type` values of the declaration's nodes.
pub mod node_type {
    pub const RESEARCH_OBJECT: &str = "trov:TransparentResearchObject";
    pub const CREATIVE_WORK: &str = "schema:CreativeWork";
    pub const TRUSTED_SYSTEM: &str = "trov:TrustedResearchSystem";
    pub const ORGANIZATION: &str = "schema:Organization";
    pub const COMPOSITION: &str = "trov:ArtifactComposition";
    pub const FINGERPRINT: &str = "trov:CompositionFingerprint";
    pub const ARTIFACT: &str = "trov:ResearchArtifact";
    pub const ARRANGEMENT: &str = "trov:ArtifactArrangement";
    pub const LOCUS: &str = "trov:ArtifactLocus";
    pub const PERFORMANCE: &str = "trov:TrustedResearchPerformance";
}

//! On-disk snapshot tree.
//!
//! Layout:
//! - manifest.json: what was exported, from where, and when
//! - `<kind>/<sanitized-id>/<kind>-entity.json`: canonical entity document
//! - `apis/<id>/openapi.json`: interface definition
//! - `apis/<id>/policy.xml`, `products/<id>/policy.xml`: policy documents
//!
//! The layout is the interchange format between export and import runs and
//! must stay stable.

pub mod reader;
pub mod writer;

pub use reader::{SnapshotEntry, SnapshotReader, SnapshotResource};
pub use writer::SnapshotWriter;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ServiceCoordinates;
use crate::model::ResourceKind;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: &str = "1";

/// Written at the root of every snapshot by the export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Snapshot layout version
    pub format_version: String,
    /// apisync version that wrote the snapshot
    pub tool_version: String,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    /// Service the snapshot was read from
    pub source: ServiceCoordinates,
    /// Kinds included in this export
    pub kinds: Vec<ResourceKind>,
    /// Resources written per kind directory
    pub counts: BTreeMap<String, u64>,
}

impl SnapshotManifest {
    pub fn new(source: ServiceCoordinates, kinds: Vec<ResourceKind>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            source,
            kinds,
            counts: BTreeMap::new(),
        }
    }
}

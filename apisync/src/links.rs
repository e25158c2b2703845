//! Late linking of resources that both exist on the target.
//!
//! Edges come from a CSV mapping file (`fromId,toId`, one API -> product pair
//! per row) and are applied only after every resource kind has been imported.

use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::warn;

use crate::client::ManagementClient;
use crate::error::{Error, Result};
use crate::isolation::{isolate, Outcome, Phase, ResourceReport, RunSummary, SummaryKey};
use crate::model::{LinkEdge, ResourceKind};

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(default, rename = "fromId", alias = "apiId", alias = "from_id")]
    from_id: Option<String>,
    #[serde(default, rename = "toId", alias = "productId", alias = "to_id")]
    to_id: Option<String>,
}

/// Parsed mapping file: usable edges plus a message per rejected row.
#[derive(Debug, Default)]
pub struct LinkMapping {
    pub edges: Vec<LinkEdge>,
    pub invalid: Vec<String>,
}

/// Read an API -> product mapping file.
///
/// Fails only when the file is missing or yields no valid row at all.
pub fn read_mapping(path: &Path) -> Result<LinkMapping> {
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut mapping = LinkMapping::default();
    for (index, row) in reader.deserialize::<MappingRow>().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                mapping.invalid.push(format!("row {}: {}", line, e));
                continue;
            }
        };
        let from = row.from_id.filter(|s| !s.is_empty());
        let to = row.to_id.filter(|s| !s.is_empty());
        match (from, to) {
            (Some(from), Some(to)) => {
                let edge = LinkEdge::api_to_product(from, to);
                if !mapping.edges.contains(&edge) {
                    mapping.edges.push(edge);
                }
            }
            (None, _) => mapping.invalid.push(format!("row {}: missing fromId", line)),
            (_, None) => mapping.invalid.push(format!("row {}: missing toId", line)),
        }
    }

    if mapping.edges.is_empty() {
        return Err(Error::NoValidRows(path.to_path_buf()));
    }
    Ok(mapping)
}

/// Applies link edges against a target service.
pub struct LinkResolver<'a> {
    client: &'a ManagementClient,
}

impl<'a> LinkResolver<'a> {
    pub fn new(client: &'a ManagementClient) -> Self {
        Self { client }
    }

    /// Ensure every edge exists. Edges with a missing endpoint are skipped
    /// with a warning; nothing aborts the remaining edges.
    pub async fn apply(&self, edges: &[LinkEdge]) -> RunSummary {
        let mut summary = RunSummary::new();
        for edge in edges {
            let id = edge.to_string();
            let mut report = ResourceReport::new(SummaryKey::Links, id.clone());
            let outcome = isolate("link", &id, Phase::Link, self.apply_edge(edge)).await;
            report.push(Phase::Link, outcome);
            summary.record(&report);
        }
        summary
    }

    async fn apply_edge(&self, edge: &LinkEdge) -> Result<Outcome> {
        let Some(segments) = link_segments(edge) else {
            warn!(%edge, "Unsupported link kinds, skipping");
            return Ok(Outcome::skipped(format!(
                "cannot link {} to {}",
                edge.from_kind, edge.to_kind
            )));
        };

        for (kind, id) in [(edge.from_kind, &edge.from_id), (edge.to_kind, &edge.to_id)] {
            if !self.client.exists(kind, id).await? {
                warn!(%edge, missing_kind = %kind, missing_id = %id, "Link endpoint not found on target, skipping");
                return Ok(Outcome::skipped(format!("{} '{}' not found on target", kind, id)));
            }
        }

        let url = self.client.url(&segments, &[])?;
        self.client.put_json(url, &json!({})).await?;
        Ok(Outcome::Applied)
    }
}

/// Association path for a supported pair of kinds.
fn link_segments(edge: &LinkEdge) -> Option<Vec<&str>> {
    match (edge.from_kind, edge.to_kind) {
        (ResourceKind::Api, ResourceKind::Product) => Some(vec![
            ResourceKind::Product.collection(),
            edge.to_id.as_str(),
            ResourceKind::Api.collection(),
            edge.from_id.as_str(),
        ]),
        _ => None,
    }
}

//! Per-kind export and import adapters.
//!
//! Every adapter exports one resource into the snapshot and replays one
//! snapshot resource against a target. Each phase runs through
//! [`crate::isolation::isolate`], so a failing phase never stops the others.

pub mod api;
pub mod definition;
pub mod entity;
pub mod secrets;

pub use api::ApiAdapter;
pub use definition::DefinitionPayload;
pub use entity::EntityAdapter;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::client::ManagementClient;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::isolation::{Outcome, ResourceReport};
use crate::model::{Artifact, ArtifactKind, ResourceDescriptor, ResourceKind};
use crate::snapshot::{SnapshotResource, SnapshotWriter};

/// What an export needs: the source, the snapshot being written, options.
pub struct ExportContext<'a> {
    pub client: &'a ManagementClient,
    pub writer: &'a SnapshotWriter,
    pub options: &'a SyncConfig,
}

#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Export one resource into the snapshot.
    async fn export(&self, ctx: &ExportContext<'_>, id: &str) -> ResourceReport;

    /// Create-or-replace one snapshot resource on the target.
    async fn import(&self, client: &ManagementClient, resource: &SnapshotResource)
        -> ResourceReport;
}

pub fn adapter_for(kind: ResourceKind) -> Box<dyn ResourceAdapter> {
    match kind {
        ResourceKind::Api => Box::new(ApiAdapter),
        other => Box::new(EntityAdapter::new(other)),
    }
}

/// Fetch the entity, scrub secrets, write the canonical entity file.
pub(crate) async fn export_entity(
    ctx: &ExportContext<'_>,
    kind: ResourceKind,
    id: &str,
) -> Result<Outcome> {
    let url = ctx.client.resource_url(kind, id)?;
    let Some(entity) = ctx.client.get_json(url).await? else {
        return Ok(Outcome::skipped("no longer present on source"));
    };
    if !entity.is_object() {
        return Err(Error::Decode(format!("{} '{}' entity is not an object", kind, id)));
    }

    let entity = secrets::scrub_for_export(kind, entity, ctx.options.include_secret_references);
    let descriptor = ResourceDescriptor::with_id(kind, id.to_string(), entity);
    ctx.writer.write_entity(&descriptor)?;
    Ok(Outcome::Applied)
}

/// Fetch the policy document as raw XML and store it when non-empty.
pub(crate) async fn export_policy(
    ctx: &ExportContext<'_>,
    kind: ResourceKind,
    id: &str,
) -> Result<Outcome> {
    let url = ctx.client.policy_url(kind, id, &[("format", "rawxml")])?;
    let Some(body) = ctx.client.get_bytes(url).await? else {
        ctx.writer.remove_artifact(kind, id, ArtifactKind::Policy)?;
        return Ok(Outcome::skipped("no policy"));
    };

    let text = policy_text(&body);
    if text.trim().is_empty() {
        ctx.writer.remove_artifact(kind, id, ArtifactKind::Policy)?;
        return Ok(Outcome::skipped("empty policy"));
    }
    let artifact = Artifact::new(ArtifactKind::Policy, text.into_bytes());
    if !artifact.matches_declared() {
        warn!(
            %kind,
            id,
            content = %artifact.content_kind(),
            "Policy is not XML, stored as captured"
        );
    }
    ctx.writer.write_artifact(kind, id, &artifact)?;
    Ok(Outcome::Applied)
}

/// Policy endpoints answer either with the XML itself or with a JSON envelope
/// carrying it under `properties.value`.
fn policy_text(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(s)) => s,
        Ok(json) => json
            .pointer("/properties/value")
            .or_else(|| json.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Apply the snapshot's policy document, if any.
pub(crate) async fn import_policy(
    client: &ManagementClient,
    resource: &SnapshotResource,
) -> Result<Outcome> {
    let Some(policy) = resource.artifact(ArtifactKind::Policy) else {
        return Ok(Outcome::skipped("no policy in snapshot"));
    };
    let text = std::str::from_utf8(&policy.bytes)
        .map_err(|_| Error::Validation(format!("{} is not UTF-8", ArtifactKind::Policy.file_name())))?;
    if text.trim().is_empty() {
        return Ok(Outcome::skipped("empty policy"));
    }

    let descriptor = &resource.descriptor;
    let url = client.policy_url(descriptor.kind, &descriptor.id, &[])?;
    let body = json!({"properties": {"format": "rawxml", "value": text}});
    client.put_json(url, &body).await?;
    Ok(Outcome::Applied)
}

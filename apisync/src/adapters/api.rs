//! Adapter for APIs: definition document, policy, and entity metadata.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::definition::{detect_import_format, DefinitionPayload};
use super::{export_entity, export_policy, import_policy, ExportContext, ResourceAdapter};
use crate::client::ManagementClient;
use crate::error::{Error, Result};
use crate::isolation::{isolate, Outcome, Phase, ResourceReport, SummaryKey};
use crate::model::{Artifact, ArtifactKind, ResourceKind};
use crate::snapshot::SnapshotResource;

/// Server-computed entity properties the target rejects or ignores on write.
const READ_ONLY_PROPERTIES: &[&str] = &["isCurrent", "isOnline", "provisioningState"];

pub struct ApiAdapter;

#[async_trait]
impl ResourceAdapter for ApiAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Api
    }

    async fn export(&self, ctx: &ExportContext<'_>, id: &str) -> ResourceReport {
        let label = ResourceKind::Api.to_string();
        let mut report = ResourceReport::new(SummaryKey::Kind(ResourceKind::Api), id);

        let definition = isolate(&label, id, Phase::Definition, export_definition(ctx, id)).await;
        report.push(Phase::Definition, definition);

        let policy = isolate(&label, id, Phase::Policy, export_policy(ctx, ResourceKind::Api, id)).await;
        report.push(Phase::Policy, policy);

        let entity = isolate(&label, id, Phase::Entity, export_entity(ctx, ResourceKind::Api, id)).await;
        report.push(Phase::Entity, entity);

        report
    }

    async fn import(
        &self,
        client: &ManagementClient,
        resource: &SnapshotResource,
    ) -> ResourceReport {
        let label = ResourceKind::Api.to_string();
        let id = resource.descriptor.id.as_str();
        let mut report = ResourceReport::new(SummaryKey::Kind(ResourceKind::Api), id);

        let entity = isolate(&label, id, Phase::Entity, import_api(client, resource)).await;
        let applied = entity == Outcome::Applied;
        report.push(Phase::Entity, entity);

        let policy = if applied {
            isolate(&label, id, Phase::Policy, import_policy(client, resource)).await
        } else {
            Outcome::skipped("entity not applied")
        };
        report.push(Phase::Policy, policy);
        report
    }
}

async fn export_definition(ctx: &ExportContext<'_>, id: &str) -> Result<Outcome> {
    let url = ctx.client.url(
        &[ResourceKind::Api.collection(), id],
        &[
            ("format", ctx.options.definition_format.as_str()),
            ("export", "true"),
        ],
    )?;
    let Some(body) = ctx.client.get_bytes(url).await? else {
        ctx.writer
            .remove_artifact(ResourceKind::Api, id, ArtifactKind::Definition)?;
        return Ok(Outcome::skipped("definition export returned nothing"));
    };

    let payload = DefinitionPayload::classify(body);
    debug!(id, shape = payload.shape(), "Definition export response");
    let document = payload.materialize(ctx.client).await?;
    if document.is_empty() {
        ctx.writer
            .remove_artifact(ResourceKind::Api, id, ArtifactKind::Definition)?;
        return Ok(Outcome::skipped("empty definition document"));
    }

    let artifact = Artifact::new(ArtifactKind::Definition, document);
    if !artifact.matches_declared() {
        warn!(
            id,
            content = %artifact.content_kind(),
            "Definition is not JSON, stored as captured"
        );
    }
    ctx.writer.write_artifact(ResourceKind::Api, id, &artifact)?;
    Ok(Outcome::Applied)
}

async fn import_api(client: &ManagementClient, resource: &SnapshotResource) -> Result<Outcome> {
    let descriptor = &resource.descriptor;
    let id = descriptor.id.as_str();
    let definition = resource
        .artifact(ArtifactKind::Definition)
        .ok_or_else(|| Error::MissingArtifact {
            kind: ResourceKind::Api.to_string(),
            id: id.to_string(),
            artifact: ArtifactKind::Definition.file_name().to_string(),
        })?;

    let document = String::from_utf8_lossy(&definition.bytes).into_owned();
    let format = detect_import_format(&definition.bytes);
    let props = descriptor.entity_properties().cloned().unwrap_or_default();
    let path = props
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or(id)
        .to_string();

    // Both calls carry the same body; only the URL differs.
    let body = json!({ "properties": import_properties(&props, format, &document, &path) });
    let import_url = client.url(&[ResourceKind::Api.collection(), id], &[("import", "true")])?;
    match client.put_json(import_url, &body).await {
        Ok(_) => return Ok(Outcome::Applied),
        Err(e) => {
            warn!(id, error = %e, "Import from definition failed, falling back to direct replace");
        }
    }

    let url = client.resource_url(ResourceKind::Api, id)?;
    client.put_json(url, &body).await?;
    Ok(Outcome::Applied)
}

fn import_properties(
    props: &Map<String, Value>,
    format: &str,
    document: &str,
    path: &str,
) -> Map<String, Value> {
    let mut out: Map<String, Value> = props
        .iter()
        .filter(|(key, value)| !value.is_null() && !READ_ONLY_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    out.insert("format".to_string(), Value::String(format.to_string()));
    out.insert("value".to_string(), Value::String(document.to_string()));
    out.insert("path".to_string(), Value::String(path.to_string()));
    out
}

//! Adapter for kinds that are a single entity document (named values,
//! loggers, backends, products). Products also carry a policy.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use super::{export_entity, export_policy, import_policy, secrets, ExportContext, ResourceAdapter};
use crate::client::ManagementClient;
use crate::error::{Error, Result};
use crate::isolation::{isolate, Outcome, Phase, ResourceReport, SummaryKey};
use crate::model::ResourceKind;
use crate::snapshot::SnapshotResource;

pub struct EntityAdapter {
    kind: ResourceKind,
}

impl EntityAdapter {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ResourceAdapter for EntityAdapter {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn export(&self, ctx: &ExportContext<'_>, id: &str) -> ResourceReport {
        let label = self.kind.to_string();
        let mut report = ResourceReport::new(SummaryKey::Kind(self.kind), id);

        if self.kind.has_policy() {
            let policy = isolate(&label, id, Phase::Policy, export_policy(ctx, self.kind, id)).await;
            report.push(Phase::Policy, policy);
        }
        let entity = isolate(&label, id, Phase::Entity, export_entity(ctx, self.kind, id)).await;
        report.push(Phase::Entity, entity);
        report
    }

    async fn import(
        &self,
        client: &ManagementClient,
        resource: &SnapshotResource,
    ) -> ResourceReport {
        let label = self.kind.to_string();
        let id = resource.descriptor.id.as_str();
        let mut report = ResourceReport::new(SummaryKey::Kind(self.kind), id);

        let entity = isolate(&label, id, Phase::Entity, replace_entity(client, resource)).await;
        let applied = entity == Outcome::Applied;
        report.push(Phase::Entity, entity);

        if self.kind.has_policy() {
            let policy = if applied {
                isolate(&label, id, Phase::Policy, import_policy(client, resource)).await
            } else {
                Outcome::skipped("entity not applied")
            };
            report.push(Phase::Policy, policy);
        }
        report
    }
}

/// Build the replace body: the entity's `properties`, minus envelope fields
/// and anything secret.
pub(crate) fn replace_body(kind: ResourceKind, entity: &Value) -> Result<(Value, bool)> {
    let mut props = match entity.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(_) => {
            return Err(Error::Validation(format!(
                "{} has non-object properties",
                kind.entity_file()
            )))
        }
    };
    let needs_rebind = secrets::strip_for_import(kind, &mut props);
    Ok((json!({ "properties": props }), needs_rebind))
}

async fn replace_entity(client: &ManagementClient, resource: &SnapshotResource) -> Result<Outcome> {
    let descriptor = &resource.descriptor;
    let (body, needs_rebind) = replace_body(descriptor.kind, &descriptor.properties)?;

    let url = client.resource_url(descriptor.kind, &descriptor.id)?;
    client.put_json(url, &body).await?;

    if needs_rebind {
        warn!(
            kind = %descriptor.kind,
            id = %descriptor.id,
            "Secret value was not replayed; rebind it on the target"
        );
    }
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_body_drops_envelope() {
        let entity = json!({
            "id": "/subscriptions/s/.../backends/legacy",
            "type": "Microsoft.ApiManagement/service/backends",
            "name": "legacy",
            "properties": {"url": "https://legacy.example.com", "protocol": "http", "credentials": null}
        });
        let (body, rebind) = replace_body(ResourceKind::Backend, &entity).unwrap();
        assert_eq!(
            body,
            json!({"properties": {"url": "https://legacy.example.com", "protocol": "http"}})
        );
        assert!(!rebind);
    }

    #[test]
    fn test_replace_body_secret_named_value() {
        let entity = json!({"name": "db", "properties": {"displayName": "db", "secret": true, "value": null}});
        let (body, rebind) = replace_body(ResourceKind::NamedValue, &entity).unwrap();
        assert!(body["properties"].get("value").is_none());
        assert_eq!(body["properties"]["secret"], true);
        assert!(rebind);
    }

    #[test]
    fn test_replace_body_rejects_bad_properties() {
        let entity = json!({"name": "x", "properties": "oops"});
        assert!(replace_body(ResourceKind::Logger, &entity).is_err());
    }
}

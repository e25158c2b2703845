//! Shapes returned by the definition export endpoint.
//!
//! Depending on service version and requested format the endpoint answers
//! with the document inline, with a link to it, or with the document itself.
//! The response is classified once here; callers only see bytes.

use serde_json::Value;

use crate::client::ManagementClient;
use crate::error::Result;
use crate::model::ContentKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionPayload {
    /// Document embedded under `value`
    Inline(Vec<u8>),
    /// Document to be downloaded from a (pre-signed) URL under `link`
    Link(String),
    /// Response body is the definition document
    Document(Vec<u8>),
    /// Nothing recognizable; bytes kept as they came
    Raw(Vec<u8>),
}

impl DefinitionPayload {
    pub fn classify(body: Vec<u8>) -> Self {
        let Ok(json) = serde_json::from_slice::<Value>(&body) else {
            return DefinitionPayload::Raw(body);
        };

        if let Some(link) = json.get("link").and_then(Value::as_str) {
            return DefinitionPayload::Link(link.to_string());
        }

        let value = json
            .get("value")
            .or_else(|| json.pointer("/properties/value"));
        if let Some(value) = value {
            if let Some(link) = value.get("link").and_then(Value::as_str) {
                return DefinitionPayload::Link(link.to_string());
            }
            match value {
                Value::String(s) => return DefinitionPayload::Inline(s.clone().into_bytes()),
                Value::Object(_) => {
                    if let Ok(bytes) = serde_json::to_vec_pretty(value) {
                        return DefinitionPayload::Inline(bytes);
                    }
                }
                _ => {}
            }
        }

        if is_definition_document(&json) {
            return DefinitionPayload::Document(body);
        }
        DefinitionPayload::Raw(body)
    }

    pub fn shape(&self) -> &'static str {
        match self {
            DefinitionPayload::Inline(_) => "inline",
            DefinitionPayload::Link(_) => "link",
            DefinitionPayload::Document(_) => "document",
            DefinitionPayload::Raw(_) => "raw",
        }
    }

    /// Resolve to the document bytes, downloading linked documents.
    pub async fn materialize(self, client: &ManagementClient) -> Result<Vec<u8>> {
        match self {
            DefinitionPayload::Link(link) => client.fetch_link(&link).await,
            DefinitionPayload::Inline(bytes)
            | DefinitionPayload::Document(bytes)
            | DefinitionPayload::Raw(bytes) => Ok(bytes),
        }
    }
}

fn is_definition_document(json: &Value) -> bool {
    ["openapi", "swagger", "paths"]
        .iter()
        .any(|key| json.get(key).is_some())
}

/// Import format understood by the high-level import call for a document.
pub fn detect_import_format(document: &[u8]) -> &'static str {
    match ContentKind::sniff(document) {
        ContentKind::Xml => "wsdl",
        ContentKind::Text => "openapi",
        ContentKind::Json => match serde_json::from_slice::<Value>(document) {
            Ok(json) if json.get("swagger").is_some() => "swagger-json",
            _ => "openapi+json",
        },
    }
}

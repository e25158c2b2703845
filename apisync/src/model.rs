//! Resource kinds, descriptors and artifacts shared by the export and import paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of manageable entity on the control plane.
///
/// Declaration order is dependency order: policies may reference named values
/// and backends, APIs are linked into products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    NamedValue,
    Logger,
    Backend,
    Product,
    Api,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::NamedValue,
        ResourceKind::Logger,
        ResourceKind::Backend,
        ResourceKind::Product,
        ResourceKind::Api,
    ];

    /// Collection segment in the management API.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::NamedValue => "namedValues",
            Self::Logger => "loggers",
            Self::Backend => "backends",
            Self::Product => "products",
            Self::Api => "apis",
        }
    }

    /// Subdirectory of the snapshot root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::NamedValue => "named-values",
            Self::Logger => "loggers",
            Self::Backend => "backends",
            Self::Product => "products",
            Self::Api => "apis",
        }
    }

    /// Canonical entity file inside each resource directory.
    pub fn entity_file(&self) -> &'static str {
        match self {
            Self::NamedValue => "named-value-entity.json",
            Self::Logger => "logger-entity.json",
            Self::Backend => "backend-entity.json",
            Self::Product => "product-entity.json",
            Self::Api => "api-entity.json",
        }
    }

    pub fn has_policy(&self) -> bool {
        matches!(self, Self::Api | Self::Product)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NamedValue => write!(f, "named-value"),
            Self::Logger => write!(f, "logger"),
            Self::Backend => write!(f, "backend"),
            Self::Product => write!(f, "product"),
            Self::Api => write!(f, "api"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "named-value" | "named-values" | "namedvalue" | "namedvalues" | "nv" => {
                Ok(Self::NamedValue)
            }
            "logger" | "loggers" => Ok(Self::Logger),
            "backend" | "backends" => Ok(Self::Backend),
            "product" | "products" => Ok(Self::Product),
            "api" | "apis" => Ok(Self::Api),
            other => Err(format!(
                "Invalid resource kind '{}'. Use apis, products, backends, loggers or named-values",
                other
            )),
        }
    }
}

/// How an artifact's bytes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Text,
}

impl ContentKind {
    /// Classify bytes by what they contain, not by the file they go to.
    pub fn sniff(bytes: &[u8]) -> Self {
        if serde_json::from_slice::<Value>(bytes).is_ok() {
            return ContentKind::Json;
        }
        if String::from_utf8_lossy(bytes).trim_start().starts_with('<') {
            ContentKind::Xml
        } else {
            ContentKind::Text
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Xml => write!(f, "xml"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Fixed-name files attached to a resource directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Interface definition document of an API
    Definition,
    /// Policy document of an API or product
    Policy,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Definition, ArtifactKind::Policy];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Definition => "openapi.json",
            Self::Policy => "policy.xml",
        }
    }

    /// Content the file name promises.
    pub fn content_kind(&self) -> ContentKind {
        match self {
            Self::Definition => ContentKind::Json,
            Self::Policy => ContentKind::Xml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn content_kind(&self) -> ContentKind {
        ContentKind::sniff(&self.bytes)
    }

    /// True when the bytes are what the file name promises.
    pub fn matches_declared(&self) -> bool {
        self.content_kind() == self.kind.content_kind()
    }
}

/// One resource as exported from, or replayed to, a service.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub id: String,
    /// API path for APIs, display name for everything else
    pub display_path: String,
    /// Full entity document as returned by the management API
    pub properties: Value,
}

impl ResourceDescriptor {
    /// Build a descriptor from an entity document (`{"name": .., "properties": {..}}`).
    pub fn from_entity(kind: ResourceKind, entity: Value) -> Option<Self> {
        let id = entity.get("name").and_then(Value::as_str)?.to_string();
        Some(Self::with_id(kind, id, entity))
    }

    pub fn with_id(kind: ResourceKind, id: String, entity: Value) -> Self {
        let props = entity.get("properties");
        let display_path = match kind {
            ResourceKind::Api => props.and_then(|p| p.get("path")),
            _ => props.and_then(|p| p.get("displayName")),
        }
        .and_then(Value::as_str)
        .unwrap_or(&id)
        .to_string();

        Self {
            kind,
            id,
            display_path,
            properties: entity,
        }
    }

    /// The `properties` object of the entity, if any.
    pub fn entity_properties(&self) -> Option<&serde_json::Map<String, Value>> {
        self.properties.get("properties").and_then(Value::as_object)
    }
}

/// Declared association between two resources that must already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdge {
    pub from_kind: ResourceKind,
    pub from_id: String,
    pub to_kind: ResourceKind,
    pub to_id: String,
}

impl LinkEdge {
    pub fn api_to_product(api_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            from_kind: ResourceKind::Api,
            from_id: api_id.into(),
            to_kind: ResourceKind::Product,
            to_id: product_id.into(),
        }
    }
}

impl std::fmt::Display for LinkEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' -> {} '{}'",
            self.from_kind, self.from_id, self.to_kind, self.to_id
        )
    }
}

/// Make an id safe to use as a single path segment.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`; `.` and `..` are escaped so
/// the result never walks out of its parent directory.
pub fn sanitize_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match sanitized.as_str() {
        "" => "_".to_string(),
        "." | ".." => sanitized.replace('.', "_"),
        _ => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::sniff(br#"{"openapi":"3.0.1"}"#), ContentKind::Json);
        assert_eq!(ContentKind::sniff(b"\n  <policies/>"), ContentKind::Xml);
        assert_eq!(ContentKind::sniff(b"openapi: 3.0.1\npaths: {}"), ContentKind::Text);

        let yaml = Artifact::new(ArtifactKind::Definition, b"openapi: 3.0.1".to_vec());
        assert_eq!(yaml.content_kind(), ContentKind::Text);
        assert!(!yaml.matches_declared());
        assert!(Artifact::new(ArtifactKind::Policy, b"<policies/>".to_vec()).matches_declared());
    }
    use serde_json::json;

    #[test]
    fn test_kind_parse() {
        assert_eq!("apis".parse::<ResourceKind>().unwrap(), ResourceKind::Api);
        assert_eq!(
            "Named-Values".parse::<ResourceKind>().unwrap(),
            ResourceKind::NamedValue
        );
        assert!("users".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_dependency_order() {
        let mut kinds = vec![ResourceKind::Api, ResourceKind::NamedValue, ResourceKind::Product];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![ResourceKind::NamedValue, ResourceKind::Product, ResourceKind::Api]
        );
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("orders-api"), "orders-api");
        assert_eq!(sanitize_id("v1.orders_api"), "v1.orders_api");
        assert_eq!(sanitize_id("echo api;rev=2"), "echo_api_rev_2");
        assert_eq!(sanitize_id("../etc"), ".._etc");
        assert_eq!(sanitize_id(".."), "__");
        assert_eq!(sanitize_id(""), "_");
    }

    #[test]
    fn test_descriptor_display_path() {
        let api = ResourceDescriptor::from_entity(
            ResourceKind::Api,
            json!({"name": "orders-api", "properties": {"path": "/orders", "displayName": "Orders"}}),
        )
        .unwrap();
        assert_eq!(api.display_path, "/orders");

        let product = ResourceDescriptor::from_entity(
            ResourceKind::Product,
            json!({"name": "starter", "properties": {"displayName": "Starter"}}),
        )
        .unwrap();
        assert_eq!(product.display_path, "Starter");

        assert!(ResourceDescriptor::from_entity(ResourceKind::Logger, json!({"id": "x"})).is_none());
    }
}

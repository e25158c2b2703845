//! Keeps secret material out of snapshots and out of replayed payloads.
//!
//! A named value counts as secret when its `secret` flag is set (bool or the
//! string "true") or when it is backed by a Key Vault reference. Its `value`
//! never crosses the snapshot boundary, whatever the source put there.

use serde_json::{Map, Value};

use crate::model::ResourceKind;

pub fn is_secret_named_value(props: &Map<String, Value>) -> bool {
    let flagged = match props.get("secret") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    let vault_backed = props.get("keyVault").is_some_and(|v| v.is_object());
    flagged || vault_backed
}

/// Null secret-bearing fields of an entity before it is written to disk.
pub fn scrub_for_export(kind: ResourceKind, mut entity: Value, keep_vault_refs: bool) -> Value {
    let Some(props) = entity.get_mut("properties").and_then(Value::as_object_mut) else {
        return entity;
    };

    match kind {
        ResourceKind::NamedValue => {
            if is_secret_named_value(props) {
                props.insert("value".to_string(), Value::Null);
                if !keep_vault_refs && props.contains_key("keyVault") {
                    props.insert("keyVault".to_string(), Value::Null);
                }
            }
        }
        ResourceKind::Logger | ResourceKind::Backend => {
            if props.contains_key("credentials") {
                props.insert("credentials".to_string(), Value::Null);
            }
        }
        ResourceKind::Product | ResourceKind::Api => {}
    }
    entity
}

/// Drop secret-bearing and nulled fields from properties about to be PUT.
///
/// Returns true when a secret value was withheld and must be rebound by hand.
pub fn strip_for_import(kind: ResourceKind, props: &mut Map<String, Value>) -> bool {
    match kind {
        ResourceKind::NamedValue => {
            if props.get("keyVault").is_some_and(Value::is_null) {
                props.remove("keyVault");
            }
            if is_secret_named_value(props) {
                props.remove("value");
                // A vault reference lets the target resolve the value itself.
                return !props.contains_key("keyVault");
            }
            if props.get("value").is_some_and(Value::is_null) {
                props.remove("value");
            }
            false
        }
        ResourceKind::Logger | ResourceKind::Backend => {
            if props.get("credentials").is_some_and(Value::is_null) {
                props.remove("credentials");
            }
            false
        }
        ResourceKind::Product | ResourceKind::Api => false,
    }
}

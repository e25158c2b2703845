//! In-memory management API used by the integration tests.
//!
//! Each test starts a real Axum HTTP server on a random port. The server
//! keeps resources, definitions, policies and product links in memory and can
//! be told to fail specific requests or to answer in alternative shapes.

#![allow(dead_code)]

use apisync::config::ManagementConfig;
use apisync::{ManagementClient, ServiceCoordinates};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "test-token";

/// How the definition export endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionShape {
    /// `{"value": "<document>"}`
    Inline,
    /// `{"value": {"link": "<server>/blob/<id>"}}`
    Link,
    /// The document itself
    Document,
}

#[derive(Debug)]
pub struct MockState {
    /// (collection, id) -> entity
    pub resources: BTreeMap<(String, String), Value>,
    /// api id -> definition document
    pub definitions: HashMap<String, String>,
    /// (collection, id) -> policy xml
    pub policies: HashMap<(String, String), String>,
    /// (product id, api id)
    pub links: BTreeSet<(String, String)>,
    pub page_size: usize,
    pub definition_shape: DefinitionShape,
    /// Answer list calls with `items` instead of `value`
    pub list_alias_items: bool,
    /// Every nextLink points back at the first page
    pub self_referential_next: bool,
    /// Answer policy GETs with raw XML instead of the JSON envelope
    pub raw_policy_responses: bool,
    /// Reject the high-level import call
    pub reject_definition_import: bool,
    /// List requests starting at this offset answer with 500
    pub fail_list_at: Option<usize>,
    /// Requests answered with 500, e.g. "GET apis/b", "EXPORT apis/b"
    pub fail_requests: HashSet<String>,
    /// Requests answered only after sleeping, keyed like `fail_requests`
    pub delay_requests: HashMap<String, Duration>,
    /// Every request as "METHOD path"
    pub log: Vec<String>,
    /// Every PUT body as (path, body)
    pub puts: Vec<(String, Value)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            definitions: HashMap::new(),
            policies: HashMap::new(),
            links: BTreeSet::new(),
            page_size: 100,
            definition_shape: DefinitionShape::Inline,
            list_alias_items: false,
            self_referential_next: false,
            raw_policy_responses: false,
            reject_definition_import: false,
            fail_list_at: None,
            fail_requests: HashSet::new(),
            delay_requests: HashMap::new(),
            log: Vec::new(),
            puts: Vec::new(),
        }
    }
}

impl MockState {
    pub fn entity(&self, collection: &str, id: &str) -> Option<&Value> {
        self.resources.get(&(collection.to_string(), id.to_string()))
    }

    pub fn count(&self, collection: &str) -> usize {
        self.resources.keys().filter(|(c, _)| c == collection).count()
    }

    pub fn insert(&mut self, collection: &str, id: &str, properties: Value) {
        let entity = json!({
            "id": format!("/{}/{}", collection, id),
            "type": format!("Microsoft.ApiManagement/service/{}", collection),
            "name": id,
            "properties": properties,
        });
        self.resources
            .insert((collection.to_string(), id.to_string()), entity);
    }

    pub fn seed_api(&mut self, id: &str, path: &str, document: &str, policy: Option<&str>) {
        self.insert(
            "apis",
            id,
            json!({"displayName": id, "path": path, "protocols": ["https"]}),
        );
        self.definitions.insert(id.to_string(), document.to_string());
        if let Some(policy) = policy {
            self.policies
                .insert(("apis".to_string(), id.to_string()), policy.to_string());
        }
    }
}

#[derive(Clone)]
struct App {
    state: Arc<Mutex<MockState>>,
    base_url: String,
}

pub struct MockApim {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockApim {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockApim {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);
        let state = Arc::new(Mutex::new(MockState::default()));

        let app = App {
            state: state.clone(),
            base_url: base_url.clone(),
        };
        let router = Router::new()
            .route(
                "/subscriptions/:sub/resourceGroups/:rg/providers/Microsoft.ApiManagement/service/:svc/*rest",
                get(handle_get).put(handle_put),
            )
            .route("/blob/:id", get(handle_blob))
            .with_state(app);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // Give the server a moment to start accepting connections.
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn coordinates() -> ServiceCoordinates {
        ServiceCoordinates::new("sub-1", "rg-test", "apim-test")
    }

    pub fn management_config(&self) -> ManagementConfig {
        ManagementConfig {
            endpoint: self.base_url.clone(),
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..Default::default()
        }
    }

    pub fn client(&self) -> ManagementClient {
        ManagementClient::new(&self.management_config(), &Self::coordinates(), TOKEN).unwrap()
    }

    /// Client whose calls give up after `secs` seconds.
    pub fn client_with_timeout(&self, secs: u64) -> ManagementClient {
        let config = ManagementConfig {
            request_timeout_secs: secs,
            ..self.management_config()
        };
        ManagementClient::new(&config, &Self::coordinates(), TOKEN).unwrap()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": {"message": message}}))).into_response()
}

async fn delay(app: &App, key: &str) {
    let pause = app.state.lock().unwrap().delay_requests.get(key).copied();
    if let Some(pause) = pause {
        tokio::time::sleep(pause).await;
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn handle_get(
    State(app): State<App>,
    Path((sub, rg, svc, rest)): Path<(String, String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "missing token");
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let exporting = query.get("export").is_some_and(|v| v == "true");
    let verb = if exporting { "EXPORT" } else { "GET" };
    let key = format!("{} {}", verb, segments.join("/"));
    delay(&app, &key).await;

    let mut state = app.state.lock().unwrap();
    state.log.push(key.clone());
    if state.fail_requests.contains(&key) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }

    match segments.as_slice() {
        [collection] => {
            let skip: usize = query.get("$skip").and_then(|s| s.parse().ok()).unwrap_or(0);
            if state.fail_list_at == Some(skip) {
                return error(StatusCode::INTERNAL_SERVER_ERROR, "injected page failure");
            }
            let all: Vec<Value> = state
                .resources
                .iter()
                .filter(|((c, _), _)| c == collection)
                .map(|(_, v)| v.clone())
                .collect();
            let page_size = state.page_size;
            let page: Vec<Value> = all.iter().skip(skip).take(page_size).cloned().collect();

            let mut body = Map::new();
            let field = if state.list_alias_items { "items" } else { "value" };
            body.insert(field.to_string(), Value::Array(page));
            let next_skip = if state.self_referential_next { 0 } else { skip + page_size };
            if state.self_referential_next || next_skip < all.len() {
                body.insert(
                    "nextLink".to_string(),
                    Value::String(format!(
                        "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}/{}?api-version=2022-08-01&$skip={}",
                        app.base_url, sub, rg, svc, collection, next_skip
                    )),
                );
            }
            Json(Value::Object(body)).into_response()
        }
        ["apis", id] if exporting => {
            let Some(document) = state.definitions.get(*id).cloned() else {
                return error(StatusCode::NOT_FOUND, "api not found");
            };
            match state.definition_shape {
                DefinitionShape::Inline => Json(json!({
                    "id": id,
                    "format": query.get("format"),
                    "value": document,
                }))
                .into_response(),
                DefinitionShape::Link => Json(json!({
                    "id": id,
                    "format": "openapi+json-link",
                    "value": {"link": format!("{}/blob/{}", app.base_url, id)},
                }))
                .into_response(),
                DefinitionShape::Document => (StatusCode::OK, document).into_response(),
            }
        }
        [collection, id] => match state.entity(collection, id) {
            Some(entity) => Json(entity.clone()).into_response(),
            None => error(StatusCode::NOT_FOUND, "resource not found"),
        },
        [collection, id, "policies", "policy"] => {
            let key = (collection.to_string(), id.to_string());
            match state.policies.get(&key) {
                Some(xml) if state.raw_policy_responses => (StatusCode::OK, xml.clone()).into_response(),
                Some(xml) => Json(json!({
                    "name": "policy",
                    "properties": {"format": query.get("format"), "value": xml}
                }))
                .into_response(),
                None => error(StatusCode::NOT_FOUND, "policy not found"),
            }
        }
        ["products", product, "apis", api] => {
            if state.links.contains(&(product.to_string(), api.to_string())) {
                Json(json!({"name": api})).into_response()
            } else {
                error(StatusCode::NOT_FOUND, "link not found")
            }
        }
        _ => error(StatusCode::NOT_FOUND, "no such route"),
    }
}

async fn handle_put(
    State(app): State<App>,
    Path((_sub, _rg, _svc, rest)): Path<(String, String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "missing token");
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let importing = query.get("import").is_some_and(|v| v == "true");
    let verb = if importing { "IMPORT" } else { "PUT" };
    let key = format!("{} {}", verb, segments.join("/"));
    delay(&app, &key).await;

    let mut state = app.state.lock().unwrap();
    state.log.push(key.clone());
    if state.fail_requests.contains(&key) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
    }

    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error(StatusCode::BAD_REQUEST, "body is not JSON"),
    };
    state.puts.push((segments.join("/"), body.clone()));
    let mut props = body
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    match segments.as_slice() {
        ["apis", id] => {
            if importing && state.reject_definition_import {
                return error(StatusCode::BAD_REQUEST, "definition import not supported");
            }
            let Some(Value::String(document)) = props.remove("value") else {
                return error(StatusCode::BAD_REQUEST, "missing value");
            };
            props.remove("format");
            state.definitions.insert(id.to_string(), document);
            state.insert("apis", id, Value::Object(props));
            let entity = state.entity("apis", id).cloned();
            Json(entity).into_response()
        }
        [collection, id, "policies", "policy"] => {
            let Some(Value::String(xml)) = props.get("value").cloned() else {
                return error(StatusCode::BAD_REQUEST, "missing policy value");
            };
            state
                .policies
                .insert((collection.to_string(), id.to_string()), xml);
            Json(json!({"name": "policy"})).into_response()
        }
        ["products", product, "apis", api] => {
            state.links.insert((product.to_string(), api.to_string()));
            Json(json!({"name": api})).into_response()
        }
        [collection, id] => {
            state.insert(collection, id, Value::Object(props));
            let entity = state.entity(collection, id).cloned();
            (StatusCode::OK, Json(entity)).into_response()
        }
        _ => error(StatusCode::NOT_FOUND, "no such route"),
    }
}

async fn handle_blob(State(app): State<App>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    // Pre-signed links must be fetched without the management token.
    if headers.contains_key("authorization") {
        return error(StatusCode::BAD_REQUEST, "unexpected authorization header");
    }
    let state = app.state.lock().unwrap();
    match state.definitions.get(&id) {
        Some(document) => (StatusCode::OK, document.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "blob not found"),
    }
}

/// Three-path OpenAPI document used across tests.
pub fn openapi_document(title: &str) -> String {
    serde_json::to_string_pretty(&json!({
        "openapi": "3.0.1",
        "info": {"title": title, "version": "1.0"},
        "paths": {"/": {"get": {"responses": {"200": {"description": "OK"}}}}}
    }))
    .unwrap()
}

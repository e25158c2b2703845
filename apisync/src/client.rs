//! HTTP client for the management API of one service instance.
//!
//! Every call carries the configured timeout and the `api-version` query
//! parameter. A 404 is reported as `Ok(None)`, never as an error.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::{ManagementConfig, ServiceCoordinates};
use crate::error::{Error, Result};
use crate::model::ResourceKind;

pub struct ManagementClient {
    http: Client,
    /// Used for pre-signed links returned by export calls; carries no token.
    anonymous: Client,
    base: Url,
    api_version: String,
    coordinates: ServiceCoordinates,
}

impl ManagementClient {
    pub fn new(
        config: &ManagementConfig,
        coordinates: &ServiceCoordinates,
        bearer_token: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", bearer_token))
            .map_err(|_| Error::Config("Bearer token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(Error::Transport)?;
        let anonymous = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(Error::Transport)?;

        let endpoint = config.endpoint.trim_end_matches('/');
        let base = Url::parse(&format!("{}/{}", endpoint, coordinates.resource_path()))?;

        Ok(Self {
            http,
            anonymous,
            base,
            api_version: config.api_version.clone(),
            coordinates: coordinates.clone(),
        })
    }

    pub fn coordinates(&self) -> &ServiceCoordinates {
        &self.coordinates
    }

    /// Build a URL below the service resource. Segments are percent-encoded.
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Endpoint {} cannot be a base URL", self.base)))?
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", &self.api_version);
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub fn collection_url(&self, kind: ResourceKind) -> Result<Url> {
        self.url(&[kind.collection()], &[])
    }

    pub fn resource_url(&self, kind: ResourceKind, id: &str) -> Result<Url> {
        self.url(&[kind.collection(), id], &[])
    }

    pub fn policy_url(&self, kind: ResourceKind, id: &str, query: &[(&str, &str)]) -> Result<Url> {
        self.url(&[kind.collection(), id, "policies", "policy"], query)
    }

    /// GET raw bytes. `None` for 404 or an empty body.
    pub async fn get_bytes(&self, url: Url) -> Result<Option<Vec<u8>>> {
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        read_body(response).await
    }

    /// GET and parse JSON. `None` for 404 or an empty body.
    pub async fn get_json(&self, url: Url) -> Result<Option<Value>> {
        match self.get_bytes(url).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    /// Whether a resource exists on this service.
    pub async fn exists(&self, kind: ResourceKind, id: &str) -> Result<bool> {
        let url = self.resource_url(kind, id)?;
        debug!(%url, "GET (existence check)");
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(status_error(s, response).await),
        }
    }

    /// PUT a JSON body. Returns the parsed response body when there is one.
    pub async fn put_json(&self, url: Url, body: &Value) -> Result<Option<Value>> {
        debug!(%url, "PUT");
        let response = self.http.put(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&bytes).ok())
    }

    /// Fetch a pre-signed link without the bearer token.
    pub async fn fetch_link(&self, link: &str) -> Result<Vec<u8>> {
        let url = Url::parse(link)?;
        debug!(%url, "GET (link)");
        let response = self.anonymous.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

async fn read_body(response: reqwest::Response) -> Result<Option<Vec<u8>>> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(status_error(status, response).await);
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(bytes.to_vec()))
    }
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    Error::Status {
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ManagementClient {
        let config = ManagementConfig {
            endpoint: "https://management.example.com/".to_string(),
            ..Default::default()
        };
        let coords = ServiceCoordinates::new("sub-1", "rg", "apim");
        ManagementClient::new(&config, &coords, "token").unwrap()
    }

    #[test]
    fn test_collection_url() {
        let url = client().collection_url(ResourceKind::Api).unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.example.com/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim/apis?api-version=2022-08-01"
        );
    }

    #[test]
    fn test_policy_url_with_format() {
        let url = client()
            .policy_url(ResourceKind::Api, "orders-api", &[("format", "rawxml")])
            .unwrap();
        assert!(url.path().ends_with("/apis/orders-api/policies/policy"));
        assert_eq!(url.query(), Some("api-version=2022-08-01&format=rawxml"));
    }

    #[test]
    fn test_segments_are_encoded() {
        let url = client().resource_url(ResourceKind::Api, "echo api;rev=2").unwrap();
        assert!(url.path().ends_with("/apis/echo%20api;rev=2"));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let coords = ServiceCoordinates::new("s", "r", "n");
        let result = ManagementClient::new(&ManagementConfig::default(), &coords, "bad\ntoken");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

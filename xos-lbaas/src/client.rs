//! HTTP client for the XOS REST API.
//!
//! Every request carries a JSON content type and basic-auth credentials.
//! Non-success responses become [`XosError::BackendRequest`]; nothing is
//! retried.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, XosError};

/// Client bound to one XOS API base (e.g. `api/tenant`).
#[derive(Clone)]
pub struct XosClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl XosClient {
    /// `base` is appended to `endpoint`; request paths are appended to that.
    pub fn new(endpoint: &str, base: &str, user: &str, password: &str) -> Self {
        let base_url = format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            base.trim_matches('/')
        );
        debug!(base_url = %base_url, user = %user, "XOS client initialized");
        Self {
            http: reqwest::Client::new(),
            base_url,
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a path relative to the base.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, &[], None).await
    }

    /// GET with query parameters, used for list/filter requests.
    pub async fn get_filtered(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Issue a request and decode the JSON answer.
    ///
    /// A 204 answer yields an empty object.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.send(method, path, &[], body).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        debug!(method = %method, url = %url, "XOS request");

        let mut req = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(&self.user, Some(&self.password));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(XosError::BackendRequest {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Object(Map::new()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| XosError::decode(format!("{} {}: {}", status, path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let client = XosClient::new("http://127.0.0.1:9000", "api/tenant", "u", "p");
        assert_eq!(client.base_url(), "http://127.0.0.1:9000/api/tenant");
        assert_eq!(
            client.url("/loadbalancers/42/"),
            "http://127.0.0.1:9000/api/tenant/loadbalancers/42/"
        );
    }

    #[test]
    fn test_url_tolerates_slashes() {
        let client = XosClient::new("http://xos:9000/", "/api/core/networks/", "u", "p");
        assert_eq!(client.url("/"), "http://xos:9000/api/core/networks/");
        assert_eq!(client.url("7/"), "http://xos:9000/api/core/networks/7/");
    }
}

//! `reqwest`-backed fetcher.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::{FetchError, Fetcher, Response};

/// Fetcher that sends real HTTP requests.
///
/// Understood option fields:
/// - `method`: HTTP method name, default `GET`
/// - `headers`: object of header name to string value
/// - `body`: a string is sent verbatim, any other JSON value is sent as JSON
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(
        &self,
        url: &str,
        options: Option<&JsonValue>,
    ) -> Result<reqwest::RequestBuilder, FetchError> {
        let method = options
            .and_then(|o| o.get("method"))
            .and_then(JsonValue::as_str)
            .unwrap_or("GET");
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| FetchError::Request(format!("invalid method {:?}: {}", method, e)))?;

        let mut request = self.client.request(method, url);

        if let Some(headers) = options.and_then(|o| o.get("headers")).and_then(JsonValue::as_object) {
            for (name, value) in headers {
                match value {
                    JsonValue::String(value) => request = request.header(name.as_str(), value.as_str()),
                    other => request = request.header(name.as_str(), other.to_string()),
                }
            }
        }

        match options.and_then(|o| o.get("body")) {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::String(body)) => request = request.body(body.clone()),
            Some(body) => request = request.json(body),
        }

        Ok(request)
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn perform_request(
        &self,
        url: &str,
        options: Option<&JsonValue>,
    ) -> Result<Response, FetchError> {
        let request = self.build(url, options)?;
        let response = request.send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response.bytes().await.map_err(map_error)?.to_vec();

        tracing::debug!(url, status, bytes = body.len(), "http fetch complete");
        Ok(Response::new(status, headers, body))
    }
}

fn map_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

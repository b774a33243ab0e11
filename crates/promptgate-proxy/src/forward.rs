//! Outbound HTTP client for the LLM backends.

use promptgate_core::{GatewayError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

/// Forwards allowed requests to an upstream backend and parses the JSON
/// response body.
///
/// The client is built with a connect timeout only — generation can be
/// slow, so there is deliberately no overall request timeout.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
}

impl Forwarder {
    /// Build a forwarder with the given connect timeout.
    pub fn new(connection_timeout_ms: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(connection_timeout_ms))
            .build()?;
        Ok(Self { client })
    }

    /// Send `body` to `{base_url}{path}` and return the parsed JSON response.
    ///
    /// Any failure — connect error, non-success status, or a body that is
    /// not JSON — is surfaced as [`GatewayError::Upstream`]. Failures are
    /// never retried here.
    pub async fn forward(
        &self,
        base_url: &str,
        path: &str,
        method: Method,
        body: &serde_json::Value,
        headers: Option<HeaderMap>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!(%url, %method, "Forwarding request upstream");

        let mut request = self.client.request(method, &url).json(body);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream(format!(
                "Upstream {url} returned status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Invalid JSON from {url}: {e}")))
    }

    /// Forward to the cloud backend, injecting the configured bearer token
    /// when the inbound request did not carry one.
    pub async fn forward_openai(
        &self,
        base_url: &str,
        path: &str,
        body: &serde_json::Value,
        inbound_authorization: Option<&str>,
        api_key: &str,
    ) -> Result<serde_json::Value> {
        let mut headers = HeaderMap::new();
        let bearer = match inbound_authorization {
            Some(auth) => Some(auth.to_string()),
            None if !api_key.is_empty() => Some(format!("Bearer {api_key}")),
            None => None,
        };
        if let Some(value) = bearer {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| GatewayError::Upstream(format!("Invalid authorization value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        self.forward(base_url, path, Method::POST, body, Some(headers))
            .await
    }
}

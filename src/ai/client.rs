//! `OpenAI` HTTP plumbing shared by both backends.
//!
//! Every call is a single attempt. A non-success status becomes
//! [`RelayError::Upstream`] carrying the untouched response body.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, error};

use crate::core::config::AppConfig;
use crate::errors::RelayError;

pub const ASSISTANTS_BETA: &str = "assistants=v2";

pub struct OpenAiClient {
    http: Client,
    base_url: String,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if a header value is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, RelayError> {
        Self::build(config, None)
    }

    /// Client that also sends the `OpenAI-Beta: assistants=v2` header.
    ///
    /// # Errors
    ///
    /// Same as [`OpenAiClient::new`].
    pub fn for_assistants(config: &AppConfig) -> Result<Self, RelayError> {
        Self::build(config, Some(ASSISTANTS_BETA))
    }

    fn build(config: &AppConfig, beta: Option<&str>) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", config.openai_api_key))
            .map_err(|e| RelayError::Config(format!("Invalid Authorization header: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert("Authorization", auth_value);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        if let Some(org) = &config.openai_org_id {
            let org_value = HeaderValue::from_str(org).map_err(|e| {
                RelayError::Config(format!("Invalid OpenAI-Organization header: {e}"))
            })?;
            headers.insert("OpenAI-Organization", org_value);
        }

        if let Some(beta) = beta {
            let beta_value = HeaderValue::from_str(beta)
                .map_err(|e| RelayError::Config(format!("Invalid OpenAI-Beta header: {e}")))?;
            headers.insert("OpenAI-Beta", beta_value);
        }

        let http = Client::builder()
            .timeout(config.http_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RelayError::Http(format!("Failed to build OpenAI HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs `body` to `path` and returns the decoded JSON response.
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses and undecodable bodies.
    pub async fn post_json(
        &self,
        step: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<Value, RelayError> {
        debug!(step, path, "POST OpenAI");
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Http(format!("OpenAI API request failed during {step}: {e}")))?;
        Self::read_json(step, response).await
    }

    /// GETs `path` with `query` and returns the decoded JSON response.
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses and undecodable bodies.
    pub async fn get_json(
        &self,
        step: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, RelayError> {
        debug!(step, path, "GET OpenAI");
        let response = self
            .http
            .get(self.endpoint(path))
            .query(query)
            .send()
            .await
            .map_err(|e| RelayError::Http(format!("OpenAI API request failed during {step}: {e}")))?;
        Self::read_json(step, response).await
    }

    async fn read_json(step: &'static str, response: Response) -> Result<Value, RelayError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            error!(step, status = status.as_u16(), "OpenAI API returned an error");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                step,
                body: error_text,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            RelayError::Unexpected(format!("Failed to parse OpenAI response during {step}: {e}"))
        })
    }
}

/// Reads a required string field such as a resource `id`.
///
/// # Errors
///
/// Returns [`RelayError::Unexpected`] when the field is missing.
pub fn required_str<'a>(value: &'a Value, field: &str, step: &str) -> Result<&'a str, RelayError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            RelayError::Unexpected(format!("OpenAI response for {step} has no '{field}'"))
        })
}

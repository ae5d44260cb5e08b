//! reqwest-backed transport to the approval service.

use crate::error::{GateError, Result};
use crate::service::ApprovalService;
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_DOMAIN: &str = "https://api.velatir.com";
const API_KEY_HEADER: &str = "X-API-Key";

/// API key and base URL for the service.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub domain: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            domain: domain.into().trim_end_matches('/').to_string(),
        }
    }
}

// Keep the key out of debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// HTTP client for the approval service. Connection handling is left to
/// reqwest; every call is a single attempt.
pub struct HttpApprovalService {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpApprovalService {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.domain, path)
    }

    async fn decode(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GateError::Service {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ApprovalService for HttpApprovalService {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }
}

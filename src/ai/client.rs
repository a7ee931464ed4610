use super::{Endpoint, ProviderTransport};
use crate::error::{truncate_detail, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://yunwu.zeabur.app";

/// Proxy REST transport shared by every operation.
///
/// Holds no per-request state; clones of the inner `reqwest::Client` share
/// one connection pool.
pub struct HttpTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::new_with_client(api_key, base_url, Client::new())
    }

    pub fn new_with_client(api_key: String, base_url: String, client: Client) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            client,
            api_key,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(err: reqwest::Error, timeout: Duration) -> Error {
        if err.is_timeout() {
            tracing::error!("Provider request timed out after {:?}", timeout);
            Error::Transport(TransportError::Timeout { after: timeout })
        } else {
            tracing::error!("Failed to send request to provider: {}", err);
            err.into()
        }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Value, timeout: Duration) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        tracing::debug!("POST {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            tracing::error!("Provider API error (status {}): {}", status, error_text);
            return Err(Error::Transport(TransportError::Status {
                status: status.as_u16(),
                detail: truncate_detail(&error_text),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;
        serde_json::from_str(&body).map_err(|e| {
            // Bodies may hold image payloads; log the size only.
            tracing::error!(
                "Failed to parse provider response: {} ({} bytes)",
                e,
                body.len()
            );
            Error::MalformedResponse(format!("Response body is not valid JSON: {}", e))
        })
    }
}

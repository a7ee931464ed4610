//! Provider integration: payload builders, response parsers and transport.
//!
//! Analyze, recognize and fuse go through the proxy's chat-completions
//! endpoint; image synthesis goes through the native `generateContent`
//! endpoint of the configured image model.

pub mod client;
pub mod mock;
pub mod payload;
pub mod response;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::HttpTransport;
pub use mock::MockTransport;
pub use payload::BuiltPayload;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Remote operation selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    ChatCompletions,
    GenerateContent { model: String },
}

impl Endpoint {
    /// Selector for a model's `generateContent` operation.
    ///
    /// Accepts both bare ids and `models/...`-prefixed ids.
    pub fn generate_content(model: &str) -> Self {
        let model = model.strip_prefix("models/").unwrap_or(model);
        Endpoint::GenerateContent {
            model: model.to_string(),
        }
    }

    /// Path appended to the proxy base URL.
    pub fn path(&self) -> String {
        match self {
            Endpoint::ChatCompletions => "/v1/chat/completions".to_string(),
            Endpoint::GenerateContent { model } => {
                format!("/v1beta/models/{}:generateContent", model)
            }
        }
    }
}

/// Sends a built payload to the provider and returns the raw JSON response.
///
/// Implementations fail with `Error::Transport` on non-success statuses,
/// connection failures and expired deadlines.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn call(&self, endpoint: &Endpoint, payload: &Value, timeout: Duration) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::ChatCompletions.path(), "/v1/chat/completions");
        assert_eq!(
            Endpoint::generate_content("gemini-3-pro-image-preview").path(),
            "/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[test]
    fn test_generate_content_strips_models_prefix() {
        assert_eq!(
            Endpoint::generate_content("models/gemini-3-pro-image-preview"),
            Endpoint::generate_content("gemini-3-pro-image-preview")
        );
    }
}

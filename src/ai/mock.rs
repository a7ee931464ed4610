use super::{Endpoint, ProviderTransport};
use crate::error::TransportError;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// 1×1 PNG returned by default for image synthesis calls.
pub const MOCK_IMAGE_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// One call observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub payload: Value,
    pub timeout: Duration,
}

enum MockReply {
    Json(Value),
    Fail(TransportError),
}

/// In-memory transport that records calls and replays queued replies.
///
/// With an empty queue it answers chat calls with `"mock text"` and image
/// calls with [`MOCK_IMAGE_BASE64`].
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: Value) -> Self {
        lock(&self.replies).push_back(MockReply::Json(response));
        self
    }

    pub fn with_failure(self, error: TransportError) -> Self {
        lock(&self.replies).push_back(MockReply::Fail(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn get_call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn default_response(endpoint: &Endpoint) -> Value {
        match endpoint {
            Endpoint::ChatCompletions => json!({
                "choices": [{ "message": { "role": "assistant", "content": "mock text" } }]
            }),
            Endpoint::GenerateContent { .. } => json!({
                "candidates": [{
                    "content": {
                        "parts": [{
                            "inlineData": { "mimeType": "image/png", "data": MOCK_IMAGE_BASE64 }
                        }]
                    }
                }]
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ProviderTransport for MockTransport {
    async fn call(&self, endpoint: &Endpoint, payload: &Value, timeout: Duration) -> Result<Value> {
        lock(&self.calls).push(RecordedCall {
            endpoint: endpoint.clone(),
            payload: payload.clone(),
            timeout,
        });

        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(MockReply::Json(value)) => Ok(value),
            Some(MockReply::Fail(error)) => Err(error.into()),
            None => Ok(Self::default_response(endpoint)),
        }
    }
}

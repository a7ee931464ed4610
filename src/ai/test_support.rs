use wiremock::matchers::{method, path};
use wiremock::{Mock, MockBuilder};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

pub fn post(endpoint_path: &str) -> MockBuilder {
    Mock::given(method("POST")).and(path(endpoint_path))
}

//! HTTP client for the upstream OpenAI-compatible API.

use serde_json::Value;

/// Thin wrapper around `reqwest` holding the base URL and bearer token.
pub struct UpstreamClient {
    base_url: String,
    bearer: Option<String>,
    client: reqwest::Client,
}

impl UpstreamClient {
    /// No overall request timeout: streaming responses stay open for as long
    /// as the model generates. Connection establishment is still bounded.
    pub fn new(base_url: String, bearer: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        let base_url = base_url.trim_end_matches('/').to_owned();
        Self {
            base_url,
            bearer,
            client,
        }
    }

    /// POST a chat-completions request and return the raw response.
    pub async fn chat_completions(&self, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        let req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(body);
        let req = match &self.bearer {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        req.send().await
    }
}

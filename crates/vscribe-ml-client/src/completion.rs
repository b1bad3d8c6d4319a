//! Chat-completion client for OpenAI-compatible APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, MlResult};
use crate::traits::TextCompleter;

const SERVICE: &str = "completion API";

/// Configuration for the completion client.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL; `/chat/completions` is appended
    pub api_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl CompletionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_url: std::env::var("COMPLETION_API_URL").unwrap_or(default.api_url),
            api_key: std::env::var("COMPLETION_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("COMPLETION_MODEL").unwrap_or(default.model),
            timeout: Duration::from_secs(
                std::env::var("COMPLETION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Completion API client.
pub struct CompletionClient {
    http: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(CompletionConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextCompleter for CompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> MlResult<String> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        debug!(model = %self.config.model, "Sending completion request");
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Upstream {
                service: SERVICE,
                status,
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| MlError::invalid_response(SERVICE, e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| MlError::invalid_response(SERVICE, "no content in completion response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CompletionClient {
        CompletionClient::new(CompletionConfig {
            api_url: server.uri(),
            api_key: Some("sk-test".to_string()),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " hello \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).complete("translate", "你好").await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn non_success_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server).complete("s", "p").await.unwrap_err();
        assert!(matches!(err, MlError::Upstream { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server).complete("s", "p").await.unwrap_err();
        assert!(matches!(err, MlError::InvalidResponse { .. }));
    }
}

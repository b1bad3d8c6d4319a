//! ML service HTTP client.
//!
//! One sidecar serves speech-to-text, sentiment, tokenization and word-cloud
//! rendering. Requests are retried with exponential backoff on retryable
//! errors.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use vscribe_models::{FrequencyTable, Sentiment};

use crate::error::{MlError, MlResult};
use crate::traits::{SentimentClassifier, SpeechToText, Tokenizer, WordCloudRenderer};
use crate::types::{
    HealthResponse, SentimentRequest, SentimentResponse, TokenizeRequest, TokenizeResponse,
    Transcription, WordCloudRequest,
};

const SERVICE: &str = "ML service";

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(600), // transcription of long audio
            max_retries: 2,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the ML sidecar.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.url("/health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// POST JSON and decode a JSON response.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> MlResult<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = self.url(path);
        debug!("Sending request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(MlError::Network)?;
                check_status(response).await
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| MlError::invalid_response(SERVICE, format!("{path}: {e}")))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff from 500ms, capped at 30s.
fn retry_delay(attempt: u32) -> Duration {
    let millis = 2u64.saturating_pow(attempt).saturating_mul(500);
    Duration::from_millis(millis.min(MAX_RETRY_DELAY_MS))
}

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Turn non-2xx responses into `MlError::Upstream`.
async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        return Err(MlError::ServiceUnavailable {
            service: SERVICE,
            message: body,
        });
    }
    Err(MlError::Upstream {
        service: SERVICE,
        status,
        body,
    })
}

#[async_trait]
impl SpeechToText for MlClient {
    async fn transcribe(&self, audio: &Path, language: &str) -> MlResult<Transcription> {
        let bytes = tokio::fs::read(audio).await.map_err(|source| MlError::Input {
            path: audio.display().to_string(),
            source,
        })?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let url = self.url("/transcribe");
        debug!("Sending {} bytes of audio to {}", bytes.len(), url);

        let response = self
            .with_retry(|| async {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str("audio/mpeg")
                    .map_err(MlError::Network)?;
                let form = Form::new()
                    .part("file", part)
                    .text("language", language.to_string());
                let response = self
                    .http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(MlError::Network)?;
                check_status(response).await
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| MlError::invalid_response(SERVICE, format!("/transcribe: {e}")))
    }
}

#[async_trait]
impl SentimentClassifier for MlClient {
    async fn classify(&self, texts: &[String]) -> MlResult<Vec<Sentiment>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response: SentimentResponse = self
            .post_json("/sentiment", &SentimentRequest { texts })
            .await?;

        if response.labels.len() != texts.len() {
            return Err(MlError::invalid_response(
                SERVICE,
                format!(
                    "/sentiment returned {} labels for {} texts",
                    response.labels.len(),
                    texts.len()
                ),
            ));
        }

        response
            .labels
            .iter()
            .map(|p| {
                Sentiment::from_label(&p.label).ok_or_else(|| {
                    MlError::invalid_response(SERVICE, format!("unknown sentiment label {:?}", p.label))
                })
            })
            .collect()
    }
}

#[async_trait]
impl Tokenizer for MlClient {
    async fn tokenize(&self, text: &str) -> MlResult<Vec<String>> {
        let response: TokenizeResponse = self.post_json("/tokenize", &TokenizeRequest { text }).await?;
        Ok(response.tokens)
    }
}

#[async_trait]
impl WordCloudRenderer for MlClient {
    async fn render(&self, frequencies: &FrequencyTable, width: u32, height: u32) -> MlResult<Vec<u8>> {
        let url = self.url("/wordcloud");
        let request = WordCloudRequest {
            frequencies: &frequencies.0,
            width,
            height,
            format: "png",
        };

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(MlError::Network)?;
                check_status(response).await
            })
            .await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(MlError::invalid_response(SERVICE, "/wordcloud returned an empty image"));
        }
        Ok(bytes.to_vec())
    }
}

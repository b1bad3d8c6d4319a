//! Collaborator ports used by the pipeline stages.

use std::path::Path;

use async_trait::async_trait;
use vscribe_models::{FrequencyTable, Sentiment};

use crate::error::MlResult;
use crate::types::Transcription;

/// Audio file to text plus timed segments.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: &str) -> MlResult<Transcription>;
}

/// One label per input text, in input order.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, texts: &[String]) -> MlResult<Vec<Sentiment>>;
}

/// Word segmentation.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    async fn tokenize(&self, text: &str) -> MlResult<Vec<String>>;
}

/// Frequency table to PNG bytes.
#[async_trait]
pub trait WordCloudRenderer: Send + Sync {
    async fn render(&self, frequencies: &FrequencyTable, width: u32, height: u32) -> MlResult<Vec<u8>>;
}

/// Remote language-model completion.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> MlResult<String>;
}

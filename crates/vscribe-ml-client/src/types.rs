//! ML service request/response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Speech-to-text result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Full transcript text
    pub text: String,
    /// Timed segments in model order
    #[serde(default)]
    pub segments: Vec<TranscribedSegment>,
    /// Detected or requested language
    #[serde(default)]
    pub language: Option<String>,
}

/// One timed segment, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SentimentRequest<'a> {
    pub texts: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentimentResponse {
    pub labels: Vec<SentimentPrediction>,
}

/// Classifier output for one text.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentPrediction {
    pub label: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenizeRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenizeResponse {
    pub tokens: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WordCloudRequest<'a> {
    pub frequencies: &'a BTreeMap<String, u64>,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

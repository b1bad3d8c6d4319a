//! Clients for the pipeline's external collaborators.
//!
//! - `MlClient` talks to the ML sidecar (speech-to-text, sentiment,
//!   tokenizer, word-cloud rasterizer)
//! - `CompletionClient` talks to an OpenAI-compatible completion API
//!
//! Stages depend on the traits in [`traits`], not on the clients.

pub mod client;
pub mod completion;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use completion::{CompletionClient, CompletionConfig};
pub use error::{MlError, MlResult};
pub use traits::{SentimentClassifier, SpeechToText, TextCompleter, Tokenizer, WordCloudRenderer};
pub use types::{HealthResponse, SentimentPrediction, Transcription, TranscribedSegment};

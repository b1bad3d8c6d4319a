//! Stage functions and the registry the executor dispatches through.
//!
//! A stage reads its input artifacts for one stem, calls one or two
//! collaborators and publishes its output artifacts. Stages never write a
//! kind they do not own, and rerunning a stage rewrites the same artifacts.

mod extract_audio;
mod frequency;
mod sentiment;
mod transcribe;
mod translate;
mod wordcloud;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use vscribe_media::AudioDemuxer;
use vscribe_ml_client::{SentimentClassifier, SpeechToText, TextCompleter, Tokenizer, WordCloudRenderer};
use vscribe_models::{ArtifactKind, StageName, StageOutput, Stem};
use vscribe_storage::{ArtifactStore, StorageError};

use crate::config::PipelineConfig;
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

pub use extract_audio::ExtractAudio;
pub use frequency::ComputeFrequency;
pub use sentiment::AnnotateSentiment;
pub use transcribe::Transcribe;
pub use translate::Translate;
pub use wordcloud::RenderWordcloud;

/// One named transformation step.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput>;
}

/// External collaborators the standard stages call.
#[derive(Clone)]
pub struct Collaborators {
    pub demuxer: Arc<dyn AudioDemuxer>,
    pub speech: Arc<dyn SpeechToText>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub renderer: Arc<dyn WordCloudRenderer>,
    pub completer: Arc<dyn TextCompleter>,
}

/// Stage name to stage function.
#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<StageName, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every stage wired to `collaborators`.
    pub fn standard(store: ArtifactStore, collaborators: Collaborators, config: PipelineConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(ExtractAudio::new(store.clone(), collaborators.demuxer)))
            .register(Arc::new(Transcribe::new(
                store.clone(),
                collaborators.speech,
                config.transcribe_language.clone(),
            )))
            .register(Arc::new(AnnotateSentiment::new(store.clone(), collaborators.classifier)))
            .register(Arc::new(ComputeFrequency::new(
                store.clone(),
                collaborators.tokenizer.clone(),
            )))
            .register(Arc::new(RenderWordcloud::new(
                store.clone(),
                collaborators.tokenizer,
                collaborators.renderer,
                config.wordcloud_width,
                config.wordcloud_height,
            )))
            .register(Arc::new(Translate::new(
                store,
                collaborators.completer,
                config.translate_target_language,
            )));
        registry
    }

    /// Add or replace the stage registered under `stage.name()`.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.insert(stage.name(), stage);
        self
    }

    pub fn get(&self, name: StageName) -> Option<Arc<dyn Stage>> {
        self.stages.get(&name).cloned()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Fail with `SourceNotFound` unless `(kind, stem)` exists.
pub(crate) async fn require_input(
    store: &ArtifactStore,
    kind: ArtifactKind,
    stem: &Stem,
) -> StageResult<()> {
    if store.exists(kind, stem).await? {
        Ok(())
    } else {
        Err(StageError::source_not_found(kind, stem))
    }
}

/// `map_err` adapter for reading a declared input: the input vanishing after
/// [`require_input`] passed is still a missing source.
pub(crate) fn input_read(
    kind: ArtifactKind,
    stem: &Stem,
) -> impl FnOnce(StorageError) -> StageError + '_ {
    move |e| {
        if e.is_not_found() {
            StageError::source_not_found(kind, stem)
        } else {
            StageError::Storage(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use async_trait::async_trait;
    use mockall::mock;
    use tempfile::TempDir;
    use vscribe_media::{AudioDemuxer, MediaResult};
    use vscribe_ml_client::{
        MlResult, SentimentClassifier, SpeechToText, TextCompleter, Tokenizer, Transcription,
        WordCloudRenderer,
    };
    use vscribe_models::{FrequencyTable, JobId, Sentiment, StageName, Stem};
    use vscribe_storage::ArtifactStore;

    use crate::logging::JobLogger;

    mock! {
        pub Demuxer {}
        #[async_trait]
        impl AudioDemuxer for Demuxer {
            async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<()>;
        }
    }

    mock! {
        pub Speech {}
        #[async_trait]
        impl SpeechToText for Speech {
            async fn transcribe(&self, audio: &Path, language: &str) -> MlResult<Transcription>;
        }
    }

    mock! {
        pub Classifier {}
        #[async_trait]
        impl SentimentClassifier for Classifier {
            async fn classify(&self, texts: &[String]) -> MlResult<Vec<Sentiment>>;
        }
    }

    mock! {
        pub Tok {}
        #[async_trait]
        impl Tokenizer for Tok {
            async fn tokenize(&self, text: &str) -> MlResult<Vec<String>>;
        }
    }

    mock! {
        pub Renderer {}
        #[async_trait]
        impl WordCloudRenderer for Renderer {
            async fn render(&self, frequencies: &FrequencyTable, width: u32, height: u32) -> MlResult<Vec<u8>>;
        }
    }

    mock! {
        pub Completer {}
        #[async_trait]
        impl TextCompleter for Completer {
            async fn complete(&self, system: &str, prompt: &str) -> MlResult<String>;
        }
    }

    pub fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    pub fn stem() -> Stem {
        Stem::parse("v1").unwrap()
    }

    pub fn logger(stage: StageName) -> JobLogger {
        JobLogger::new(&JobId::new(), stage, &stem())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use vscribe_models::FailureKind;

    fn collaborators() -> Collaborators {
        Collaborators {
            demuxer: Arc::new(MockDemuxer::new()),
            speech: Arc::new(MockSpeech::new()),
            classifier: Arc::new(MockClassifier::new()),
            tokenizer: Arc::new(MockTok::new()),
            renderer: Arc::new(MockRenderer::new()),
            completer: Arc::new(MockCompleter::new()),
        }
    }

    #[test]
    fn standard_registry_covers_every_stage() {
        let (_dir, store) = store();
        let registry = StageRegistry::standard(store, collaborators(), PipelineConfig::default());

        assert_eq!(registry.len(), StageName::ALL.len());
        for name in StageName::ALL {
            let stage = registry.get(name).unwrap();
            assert_eq!(stage.name(), name);
        }
    }

    #[test]
    fn vanished_input_reads_as_source_not_found() {
        let err = input_read(ArtifactKind::TranscriptText, &stem())(StorageError::not_found(
            "transcript_text/v1",
        ));
        assert_eq!(err.failure_kind(), FailureKind::SourceNotFound);
        assert!(err.to_string().contains("v1"));

        let err = input_read(ArtifactKind::TranscriptText, &stem())(StorageError::catalog("locked"));
        assert_eq!(err.failure_kind(), FailureKind::Internal);
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = StageRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(StageName::Translate).is_none());
    }
}

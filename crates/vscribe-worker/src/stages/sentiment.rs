use std::sync::Arc;

use async_trait::async_trait;
use vscribe_ml_client::SentimentClassifier;
use vscribe_models::{parse_srt, ArtifactKind, StageName, StageOutput, Stem, SubtitleSegment};
use vscribe_storage::ArtifactStore;

use super::{input_read, require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

/// subtitles → segments labeled positive / neutral / negative
pub struct AnnotateSentiment {
    store: ArtifactStore,
    classifier: Arc<dyn SentimentClassifier>,
}

impl AnnotateSentiment {
    pub fn new(store: ArtifactStore, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { store, classifier }
    }
}

#[async_trait]
impl Stage for AnnotateSentiment {
    fn name(&self) -> StageName {
        StageName::AnnotateSentiment
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::TranscriptSubtitle, stem).await?;
        let srt = self
            .store
            .read_to_string(ArtifactKind::TranscriptSubtitle, stem)
            .await
            .map_err(input_read(ArtifactKind::TranscriptSubtitle, stem))?;

        let parsed = parse_srt(&srt);
        if parsed.skipped > 0 {
            logger.log_warning(&format!("skipped {} malformed subtitle blocks", parsed.skipped));
        }

        let annotated: Vec<SubtitleSegment> = if parsed.segments.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = parsed.segments.iter().map(|s| s.text.clone()).collect();
            let labels = self
                .classifier
                .classify(&texts)
                .await
                .map_err(StageError::collaborator("sentiment classifier"))?;
            if labels.len() != parsed.segments.len() {
                return Err(StageError::processing(format!(
                    "sentiment classifier returned {} labels for {} segments",
                    labels.len(),
                    parsed.segments.len()
                )));
            }
            parsed
                .segments
                .into_iter()
                .zip(labels)
                .map(|(segment, label)| segment.with_sentiment(label))
                .collect()
        };

        let location = self
            .store
            .write_json(ArtifactKind::SentimentAnnotated, stem, &annotated)
            .await?;
        logger.log_progress(&format!("labeled {} segments", annotated.len()));
        Ok(StageOutput::new(vec![location]))
    }
}

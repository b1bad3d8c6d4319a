use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use vscribe_ml_client::TextCompleter;
use vscribe_models::{
    render_plain_text, ArtifactKind, StageName, StageOutput, Stem, SubtitleSegment,
    TranslatedSegment, Translation,
};
use vscribe_storage::ArtifactStore;

use super::{input_read, require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;
use crate::metrics;

/// sentiment-annotated segments → translated segments (json + txt)
///
/// One completion call per segment. A segment whose call fails is logged,
/// left out and listed in `dropped_segments`; the job still succeeds unless
/// every segment failed.
pub struct Translate {
    store: ArtifactStore,
    completer: Arc<dyn TextCompleter>,
    target_language: String,
}

impl Translate {
    pub fn new(store: ArtifactStore, completer: Arc<dyn TextCompleter>, target_language: String) -> Self {
        Self {
            store,
            completer,
            target_language,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a subtitle translator. Translate the user's text into {}. \
             Reply with the translation only.",
            self.target_language
        )
    }
}

#[async_trait]
impl Stage for Translate {
    fn name(&self) -> StageName {
        StageName::Translate
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::SentimentAnnotated, stem).await?;
        let source: Vec<SubtitleSegment> = self
            .store
            .read_json(ArtifactKind::SentimentAnnotated, stem)
            .await
            .map_err(input_read(ArtifactKind::SentimentAnnotated, stem))?;

        let system = self.system_prompt();
        let mut translation = Translation {
            target_language: self.target_language.clone(),
            ..Default::default()
        };

        let mut last_error = None;
        for (index, segment) in source.iter().enumerate() {
            match self.completer.complete(&system, &segment.text).await {
                Ok(text) => translation
                    .segments
                    .push(TranslatedSegment::from_source(index, segment, text)),
                Err(e) => {
                    warn!(
                        job_id = %logger.job_id(),
                        stem = %stem,
                        segment = index,
                        "Dropping segment, completion API failed: {}", e
                    );
                    translation.dropped_segments.push(index);
                    last_error = Some(e);
                }
            }
        }

        if translation.segments.is_empty() {
            if let Some(e) = last_error {
                return Err(StageError::Upstream(e));
            }
        }

        if !translation.dropped_segments.is_empty() {
            metrics::record_dropped_segments(translation.dropped_segments.len());
        }

        let json = self
            .store
            .write_json(ArtifactKind::Translated, stem, &translation)
            .await?;
        let text = self
            .store
            .write_variant(
                ArtifactKind::Translated,
                stem,
                "txt",
                render_plain_text(&translation.segments),
            )
            .await?;

        logger.log_progress(&format!(
            "translated {}/{} segments into {}",
            translation.segments.len(),
            source.len(),
            self.target_language
        ));
        Ok(StageOutput::new(vec![json, text]).with_dropped_segments(translation.dropped_segments))
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use vscribe_ml_client::{MlError, SpeechToText, Transcription};
use vscribe_models::{
    compose_srt, ArtifactKey, ArtifactKind, StageName, StageOutput, Stem, SubtitleSegment,
    TimeRange,
};
use vscribe_storage::ArtifactStore;

use super::{require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

/// audio → transcript text + SRT subtitles
pub struct Transcribe {
    store: ArtifactStore,
    speech: Arc<dyn SpeechToText>,
    language: String,
}

impl Transcribe {
    pub fn new(store: ArtifactStore, speech: Arc<dyn SpeechToText>, language: String) -> Self {
        Self {
            store,
            speech,
            language,
        }
    }
}

#[async_trait]
impl Stage for Transcribe {
    fn name(&self) -> StageName {
        StageName::Transcribe
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::Audio, stem).await?;
        let audio = self.store.path_for(&ArtifactKey::new(ArtifactKind::Audio, stem.clone()));

        logger.log_progress(&format!("transcribing ({})", self.language));
        let transcription = self
            .speech
            .transcribe(&audio, &self.language)
            .await
            .map_err(|e| match e {
                MlError::Input { ref source, .. }
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    StageError::source_not_found(ArtifactKind::Audio, stem)
                }
                e => StageError::collaborator("speech-to-text")(e),
            })?;
        let segments = to_segments(&transcription)?;

        let text = self
            .store
            .write(ArtifactKind::TranscriptText, stem, transcription.text.trim())
            .await?;
        let subtitles = self
            .store
            .write(ArtifactKind::TranscriptSubtitle, stem, compose_srt(&segments))
            .await?;

        logger.log_progress(&format!("{} segments", segments.len()));
        Ok(StageOutput::new(vec![text, subtitles]))
    }
}

fn to_segments(transcription: &Transcription) -> StageResult<Vec<SubtitleSegment>> {
    transcription
        .segments
        .iter()
        .map(|s| {
            let range = TimeRange::from_secs(s.start, s.end).map_err(|e| {
                StageError::processing(format!("speech-to-text returned a bad segment: {e}"))
            })?;
            Ok(SubtitleSegment::new(range, s.text.trim()))
        })
        .collect()
}

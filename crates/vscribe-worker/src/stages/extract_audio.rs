use std::sync::Arc;

use async_trait::async_trait;
use vscribe_media::{AudioDemuxer, MediaError};
use vscribe_models::{ArtifactKey, ArtifactKind, StageName, StageOutput, Stem};
use vscribe_storage::ArtifactStore;

use super::{require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

/// video → audio
pub struct ExtractAudio {
    store: ArtifactStore,
    demuxer: Arc<dyn AudioDemuxer>,
}

impl ExtractAudio {
    pub fn new(store: ArtifactStore, demuxer: Arc<dyn AudioDemuxer>) -> Self {
        Self { store, demuxer }
    }
}

#[async_trait]
impl Stage for ExtractAudio {
    fn name(&self) -> StageName {
        StageName::ExtractAudio
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::Video, stem).await?;
        let video = self.store.path_for(&ArtifactKey::new(ArtifactKind::Video, stem.clone()));

        // The demuxer writes outside the store; the result is moved in whole.
        let work_dir = tempfile::Builder::new()
            .prefix("vscribe-audio-")
            .tempdir()
            .map_err(|e| StageError::internal(format!("cannot create work dir: {e}")))?;
        let scratch = work_dir
            .path()
            .join(format!("{}.{}", stem, ArtifactKind::Audio.extension()));

        logger.log_progress("demuxing audio track");
        self.demuxer
            .extract_audio(&video, &scratch)
            .await
            .map_err(|e| match e {
                MediaError::FileNotFound(_) => {
                    StageError::source_not_found(ArtifactKind::Video, stem)
                }
                e => StageError::from(e),
            })?;

        let location = self
            .store
            .persist_file(ArtifactKind::Audio, stem, &scratch)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    StageError::processing(format!("demuxer produced no audio file for {stem}"))
                } else {
                    StageError::from(e)
                }
            })?;

        Ok(StageOutput::new(vec![location]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use vscribe_models::FailureKind;

    #[tokio::test]
    async fn moves_demuxed_audio_into_store() {
        let (_dir, store) = store();
        store.write(ArtifactKind::Video, &stem(), b"mp4").await.unwrap();

        let mut demuxer = MockDemuxer::new();
        demuxer
            .expect_extract_audio()
            .times(1)
            .returning(|_, output| {
                std::fs::write(output, b"mp3").unwrap();
                Ok(())
            });

        let stage = ExtractAudio::new(store.clone(), Arc::new(demuxer));
        let output = stage
            .run(&stem(), &logger(StageName::ExtractAudio))
            .await
            .unwrap();

        assert_eq!(output.artifacts[0].kind, ArtifactKind::Audio);
        assert_eq!(store.read(ArtifactKind::Audio, &stem()).await.unwrap(), b"mp3");
    }

    #[tokio::test]
    async fn missing_video_is_source_not_found() {
        let (_dir, store) = store();
        let mut demuxer = MockDemuxer::new();
        demuxer.expect_extract_audio().never();

        let stage = ExtractAudio::new(store, Arc::new(demuxer));
        let err = stage
            .run(&stem(), &logger(StageName::ExtractAudio))
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::SourceNotFound);
    }

    #[tokio::test]
    async fn video_removed_mid_run_is_source_not_found() {
        let (_dir, store) = store();
        store.write(ArtifactKind::Video, &stem(), b"mp4").await.unwrap();

        let mut demuxer = MockDemuxer::new();
        demuxer
            .expect_extract_audio()
            .times(1)
            .returning(|video, _| Err(MediaError::FileNotFound(video.to_path_buf())));

        let stage = ExtractAudio::new(store, Arc::new(demuxer));
        let err = stage
            .run(&stem(), &logger(StageName::ExtractAudio))
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::SourceNotFound);
        assert!(err.to_string().contains("video"));
    }

    #[tokio::test]
    async fn demux_failure_is_processing_error() {
        let (_dir, store) = store();
        store.write(ArtifactKind::Video, &stem(), b"mp4").await.unwrap();

        let mut demuxer = MockDemuxer::new();
        demuxer
            .expect_extract_audio()
            .returning(|video, _| Err(MediaError::NoAudioStream(video.to_path_buf())));

        let stage = ExtractAudio::new(store.clone(), Arc::new(demuxer));
        let err = stage
            .run(&stem(), &logger(StageName::ExtractAudio))
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::ProcessingError);
        assert!(!store.exists(ArtifactKind::Audio, &stem()).await.unwrap());
    }
}

//! Audio track extraction.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Demuxes the audio track of a video into an MP3 file.
#[async_trait]
pub trait AudioDemuxer: Send + Sync {
    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<()>;
}

/// `ffmpeg -i <video> -vn -acodec libmp3lame <output>`
#[derive(Debug, Clone)]
pub struct FfmpegDemuxer {
    runner: FfmpegRunner,
    bitrate: String,
}

impl Default for FfmpegDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegDemuxer {
    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new(),
            bitrate: "192k".to_string(),
        }
    }

    /// Kill FFmpeg after `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn command(&self, video: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .no_video()
            .audio_codec("libmp3lame")
            .audio_bitrate(self.bitrate.clone())
    }
}

#[async_trait]
impl AudioDemuxer for FfmpegDemuxer {
    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<()> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        let info = probe_media(video).await?;
        if !info.has_audio {
            return Err(MediaError::NoAudioStream(video.to_path_buf()));
        }

        self.runner.run(&self.command(video, output)).await?;

        info!("Extracted audio {} -> {}", video.display(), output.display());
        Ok(())
    }
}

//! FFmpeg CLI wrapper for audio extraction.
//!
//! This crate provides:
//! - FFmpeg command building and execution with timeouts
//! - FFprobe stream inspection
//! - The `AudioDemuxer` port and its FFmpeg implementation

pub mod audio;
pub mod command;
pub mod error;
pub mod probe;

pub use audio::{AudioDemuxer, FfmpegDemuxer};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};

//! Artifact kinds and typed artifact keys.
//!
//! Every artifact is addressed by `(kind, stem)`. The kind decides the
//! directory and the canonical file extension, so no stage ever builds a
//! path by hand.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::stem::Stem;
use crate::ModelError;

/// Category of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Video,
    Audio,
    TranscriptText,
    TranscriptSubtitle,
    SentimentAnnotated,
    Translated,
    FrequencyTable,
    WordCloudImage,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 8] = [
        ArtifactKind::Video,
        ArtifactKind::Audio,
        ArtifactKind::TranscriptText,
        ArtifactKind::TranscriptSubtitle,
        ArtifactKind::SentimentAnnotated,
        ArtifactKind::Translated,
        ArtifactKind::FrequencyTable,
        ArtifactKind::WordCloudImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            ArtifactKind::TranscriptText => "transcript-text",
            ArtifactKind::TranscriptSubtitle => "transcript-subtitle",
            ArtifactKind::SentimentAnnotated => "sentiment-annotated",
            ArtifactKind::Translated => "translated",
            ArtifactKind::FrequencyTable => "frequency-table",
            ArtifactKind::WordCloudImage => "word-cloud-image",
        }
    }

    /// Directory holding this kind's namespace under the store root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "videos",
            ArtifactKind::Audio => "audios",
            ArtifactKind::TranscriptText => "transcripts",
            ArtifactKind::TranscriptSubtitle => "subtitles",
            ArtifactKind::SentimentAnnotated => "sentiments",
            ArtifactKind::Translated => "translations",
            ArtifactKind::FrequencyTable => "frequencies",
            ArtifactKind::WordCloudImage => "wordclouds",
        }
    }

    /// Allowed extensions, canonical one first.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Video => &["mp4"],
            ArtifactKind::Audio => &["mp3"],
            ArtifactKind::TranscriptText => &["txt"],
            ArtifactKind::TranscriptSubtitle => &["srt"],
            ArtifactKind::SentimentAnnotated => &["json"],
            ArtifactKind::Translated => &["json", "txt"],
            ArtifactKind::FrequencyTable => &["json"],
            ArtifactKind::WordCloudImage => &["png"],
        }
    }

    /// Canonical extension.
    pub fn extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// MIME type served for the canonical rendition.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Audio => "audio/mpeg",
            ArtifactKind::TranscriptText => "text/plain; charset=utf-8",
            ArtifactKind::TranscriptSubtitle => "application/x-subrip",
            ArtifactKind::SentimentAnnotated
            | ArtifactKind::Translated
            | ArtifactKind::FrequencyTable => "application/json",
            ArtifactKind::WordCloudImage => "image/png",
        }
    }

    /// Whether deleting this kind also removes a catalog row.
    pub fn has_catalog_row(&self) -> bool {
        matches!(self, ArtifactKind::Video | ArtifactKind::WordCloudImage)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ModelError::UnknownArtifactKind(s.to_string()))
    }
}

/// Fully resolved artifact address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub stem: Stem,
    pub extension: &'static str,
}

impl ArtifactKey {
    /// Key of the canonical rendition.
    pub fn new(kind: ArtifactKind, stem: Stem) -> Self {
        Self {
            kind,
            stem,
            extension: kind.extension(),
        }
    }

    /// Key of a secondary rendition, rejecting extensions the kind does not own.
    pub fn variant(kind: ArtifactKind, stem: Stem, extension: &str) -> Result<Self, ModelError> {
        let extension = kind
            .extensions()
            .iter()
            .copied()
            .find(|e| *e == extension)
            .ok_or_else(|| ModelError::UnsupportedExtension {
                kind,
                extension: extension.to_string(),
            })?;
        Ok(Self {
            kind,
            stem,
            extension,
        })
    }

    /// Path relative to the store root: `<dir>/<stem>.<ext>`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}.{}", self.kind.dir_name(), self.stem, self.extension)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.stem)?;
        if self.extension != self.kind.extension() {
            write!(f, " ({})", self.extension)?;
        }
        Ok(())
    }
}

/// Where an artifact was published, reported in job results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactLocation {
    pub kind: ArtifactKind,
    pub stem: String,
    /// Path relative to the artifact root.
    pub path: String,
    pub size_bytes: u64,
}

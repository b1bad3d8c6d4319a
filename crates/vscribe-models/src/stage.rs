//! Pipeline stage names and their artifact contracts.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::ModelError;

/// One named transformation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    ExtractAudio,
    Transcribe,
    AnnotateSentiment,
    ComputeFrequency,
    RenderWordcloud,
    Translate,
}

impl StageName {
    pub const ALL: [StageName; 6] = [
        StageName::ExtractAudio,
        StageName::Transcribe,
        StageName::AnnotateSentiment,
        StageName::ComputeFrequency,
        StageName::RenderWordcloud,
        StageName::Translate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::ExtractAudio => "extract-audio",
            StageName::Transcribe => "transcribe",
            StageName::AnnotateSentiment => "annotate-sentiment",
            StageName::ComputeFrequency => "compute-frequency",
            StageName::RenderWordcloud => "render-wordcloud",
            StageName::Translate => "translate",
        }
    }

    /// Artifacts the stage reads.
    pub fn inputs(&self) -> &'static [ArtifactKind] {
        match self {
            StageName::ExtractAudio => &[ArtifactKind::Video],
            StageName::Transcribe => &[ArtifactKind::Audio],
            StageName::AnnotateSentiment => &[ArtifactKind::TranscriptSubtitle],
            StageName::ComputeFrequency => &[ArtifactKind::TranscriptText],
            StageName::RenderWordcloud => &[ArtifactKind::TranscriptText],
            StageName::Translate => &[ArtifactKind::SentimentAnnotated],
        }
    }

    /// Artifact kinds the stage owns. Nothing else ever writes them.
    pub fn outputs(&self) -> &'static [ArtifactKind] {
        match self {
            StageName::ExtractAudio => &[ArtifactKind::Audio],
            StageName::Transcribe => &[ArtifactKind::TranscriptText, ArtifactKind::TranscriptSubtitle],
            StageName::AnnotateSentiment => &[ArtifactKind::SentimentAnnotated],
            StageName::ComputeFrequency => &[ArtifactKind::FrequencyTable],
            StageName::RenderWordcloud => &[ArtifactKind::WordCloudImage],
            StageName::Translate => &[ArtifactKind::Translated],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn one_kind_one_writer() {
        let mut seen = HashSet::new();
        for stage in StageName::ALL {
            for kind in stage.outputs() {
                assert!(seen.insert(*kind), "{kind} has two writers");
            }
        }
        // Video is written by the upload handler only.
        assert!(!seen.contains(&ArtifactKind::Video));
    }

    #[test]
    fn parses_kebab_names() {
        assert_eq!("render-wordcloud".parse::<StageName>().unwrap(), StageName::RenderWordcloud);
        assert!("render_wordcloud".parse::<StageName>().is_err());
    }
}

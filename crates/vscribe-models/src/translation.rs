//! Translated subtitle entries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sentiment::Sentiment;
use crate::subtitle::{compose_srt, SubtitleSegment, TimeRange};

/// One translated segment. `index` is the position of the source segment in
/// the sentiment-annotated input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TranslatedSegment {
    pub index: usize,
    pub time_range: TimeRange,
    pub source_text: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl TranslatedSegment {
    pub fn from_source(index: usize, source: &SubtitleSegment, text: impl Into<String>) -> Self {
        Self {
            index,
            time_range: source.time_range,
            source_text: source.text.clone(),
            text: text.into(),
            sentiment: source.sentiment,
        }
    }
}

/// Payload of the translated artifact.
///
/// Segments whose completion failed are left out of `segments` and listed by
/// source index in `dropped_segments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Translation {
    pub target_language: String,
    pub segments: Vec<TranslatedSegment>,
    #[serde(default)]
    pub dropped_segments: Vec<usize>,
}

/// Plain-text rendition: the translated lines as SRT.
pub fn render_plain_text(segments: &[TranslatedSegment]) -> String {
    let subtitles: Vec<SubtitleSegment> = segments
        .iter()
        .map(|s| SubtitleSegment {
            time_range: s.time_range,
            text: s.text.clone(),
            sentiment: s.sentiment,
        })
        .collect();
    compose_srt(&subtitles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_source_timing_and_label() {
        let source = SubtitleSegment::new(TimeRange::new(100, 900).unwrap(), "你好")
            .with_sentiment(Sentiment::Positive);
        let translated = TranslatedSegment::from_source(3, &source, "hello");

        assert_eq!(translated.index, 3);
        assert_eq!(translated.time_range, source.time_range);
        assert_eq!(translated.source_text, "你好");
        assert_eq!(translated.sentiment, Some(Sentiment::Positive));
        assert_eq!(
            render_plain_text(&[translated]),
            "1\n00:00:00,100 --> 00:00:00,900\nhello\n\n"
        );
    }
}

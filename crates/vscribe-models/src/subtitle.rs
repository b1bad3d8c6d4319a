//! Subtitle segments and the SRT text format.
//!
//! Transcripts are written as standard SRT blocks:
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:01,500
//! hello world
//! ```
//!
//! The parser also accepts blocks without an index line whose timestamps are
//! plain seconds (`0.0 --> 1.5`). Blocks that cannot be read are skipped and
//! counted.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sentiment::Sentiment;
use crate::ModelError;

/// Half-open time span in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self, ModelError> {
        if end_ms < start_ms {
            return Err(ModelError::InvalidSubtitle(format!(
                "time range ends before it starts: {start_ms} > {end_ms}"
            )));
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Build from fractional seconds as reported by speech models.
    pub fn from_secs(start: f64, end: f64) -> Result<Self, ModelError> {
        Self::new(secs_to_ms(start)?, secs_to_ms(end)?)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --> {}",
            format_timestamp(self.start_ms),
            format_timestamp(self.end_ms)
        )
    }
}

/// One timed piece of transcript, optionally labeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleSegment {
    pub time_range: TimeRange,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl SubtitleSegment {
    pub fn new(time_range: TimeRange, text: impl Into<String>) -> Self {
        Self {
            time_range,
            text: text.into(),
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

/// Outcome of parsing an SRT document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSubtitles {
    pub segments: Vec<SubtitleSegment>,
    /// Number of blocks that were skipped as malformed.
    pub skipped: usize,
}

fn secs_to_ms(secs: f64) -> Result<u64, ModelError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ModelError::InvalidSubtitle(format!("invalid timestamp: {secs}")));
    }
    Ok((secs * 1000.0).round() as u64)
}

/// `HH:MM:SS,mmm`
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Parse `HH:MM:SS,mmm` (or `.` as the fraction separator) or plain seconds.
pub fn parse_timestamp(raw: &str) -> Result<u64, ModelError> {
    let raw = raw.trim();
    let invalid = || ModelError::InvalidSubtitle(format!("invalid timestamp: {raw:?}"));

    if !raw.contains(':') {
        let secs: f64 = raw.parse().map_err(|_| invalid())?;
        return secs_to_ms(secs).map_err(|_| invalid());
    }

    let (clock, fraction) = match raw.split_once([',', '.']) {
        Some((clock, fraction)) => (clock, fraction),
        None => (raw, "0"),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 || fraction.is_empty() || fraction.len() > 3 {
        return Err(invalid());
    }
    let field = |s: &str| s.parse::<u64>().map_err(|_| invalid());
    let (hours, minutes, seconds) = (field(parts[0])?, field(parts[1])?, field(parts[2])?);
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }
    // "5" means 500 ms, "05" means 50 ms.
    let millis = field(fraction)? * 10u64.pow(3 - fraction.len() as u32);

    hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1000 + millis))
        .ok_or_else(invalid)
}

/// Render segments as SRT, numbering blocks from 1.
pub fn compose_srt(segments: &[SubtitleSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{}\n{}\n\n",
            i + 1,
            segment.time_range,
            segment.text.trim()
        ));
    }
    out
}

/// Parse an SRT document, skipping malformed blocks.
pub fn parse_srt(input: &str) -> ParsedSubtitles {
    let normalized = input.replace("\r\n", "\n");
    let mut parsed = ParsedSubtitles::default();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim_end)
            .skip_while(|l| l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }
        match parse_block(&lines) {
            Ok(segment) => parsed.segments.push(segment),
            Err(_) => parsed.skipped += 1,
        }
    }

    parsed
}

fn parse_block(lines: &[&str]) -> Result<SubtitleSegment, ModelError> {
    let mut rest = lines;
    if !rest[0].contains("-->") {
        if rest[0].trim().parse::<u64>().is_err() {
            return Err(ModelError::InvalidSubtitle(format!("bad block header: {:?}", rest[0])));
        }
        rest = &rest[1..];
    }

    let (timing, text_lines) = rest
        .split_first()
        .ok_or_else(|| ModelError::InvalidSubtitle("block has no timing line".into()))?;
    let (start, end) = timing
        .split_once("-->")
        .ok_or_else(|| ModelError::InvalidSubtitle(format!("bad timing line: {timing:?}")))?;
    let time_range = TimeRange::new(parse_timestamp(start)?, parse_timestamp(end)?)?;

    let text = text_lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return Err(ModelError::InvalidSubtitle("block has no text".into()));
    }

    Ok(SubtitleSegment::new(time_range, text))
}

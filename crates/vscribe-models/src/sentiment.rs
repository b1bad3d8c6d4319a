//! Sentiment labels.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Map a classifier label onto the three-way scale.
    ///
    /// Accepts the full names, their three-letter abbreviations and the
    /// `LABEL_0..2` ids emitted by sequence classifiers (0 = negative).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "label_2" => Some(Sentiment::Positive),
            "neutral" | "neu" | "label_1" => Some(Sentiment::Neutral),
            "negative" | "neg" | "label_0" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sentiment::from_label(s).ok_or_else(|| ModelError::UnknownSentiment(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_labels() {
        assert_eq!(Sentiment::from_label("POSITIVE"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_label(" neg "), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_label("LABEL_1"), Some(Sentiment::Neutral));
        assert!("mixed".parse::<Sentiment>().is_err());
    }
}

//! Stems: the identifier shared by every artifact derived from one upload.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ModelError;

/// Maximum stem length in bytes.
pub const MAX_STEM_LEN: usize = 200;

/// Validated stem.
///
/// Only ASCII alphanumerics, `-`, `_` and `.` are accepted, which keeps a
/// stem usable as a file name and a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stem(String);

impl Stem {
    /// Validate an existing stem.
    pub fn parse(s: impl Into<String>) -> Result<Self, ModelError> {
        let s = s.into();
        if s.is_empty() || s.len() > MAX_STEM_LEN {
            return Err(ModelError::InvalidStem(s));
        }
        if s == "." || s == ".." {
            return Err(ModelError::InvalidStem(s));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ModelError::InvalidStem(s));
        }
        Ok(Self(s))
    }

    /// Generate a fresh stem for an upload: `<uuid>-<sanitized name>`.
    pub fn generate(original_filename: Option<&str>) -> Self {
        let id = Uuid::new_v4().to_string();
        let name = original_filename.map(sanitize_file_stem).unwrap_or_default();
        if name.is_empty() {
            return Self(id);
        }
        let budget = MAX_STEM_LEN - id.len() - 1;
        let name: String = name.chars().take(budget).collect();
        Self(format!("{}-{}", id, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Drop the extension and replace anything outside the stem alphabet.
fn sanitize_file_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let without_ext = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };
    let cleaned: String = without_ext
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Stem {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Stem::parse(value)
    }
}

impl From<Stem> for String {
    fn from(stem: Stem) -> Self {
        stem.0
    }
}

impl AsRef<str> for Stem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_tricks() {
        for bad in ["", ".", "..", "a/b", "a\\b", "../etc", "has space", "ü"] {
            assert!(Stem::parse(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(Stem::parse("a".repeat(MAX_STEM_LEN + 1)).is_err());
    }

    #[test]
    fn accepts_plain_stems() {
        assert!(Stem::parse("v1").is_ok());
        assert!(Stem::parse("3f2a-clip_01.final").is_ok());
    }

    #[test]
    fn generated_stem_keeps_sanitized_name() {
        let stem = Stem::generate(Some("my holiday (1).mov"));
        assert!(stem.as_str().ends_with("-my_holiday__1"));
        assert!(Stem::parse(stem.as_str()).is_ok());
    }

    #[test]
    fn generated_stems_are_unique() {
        assert_ne!(Stem::generate(Some("a.mp4")), Stem::generate(Some("a.mp4")));
        assert_eq!(Stem::generate(None).as_str().len(), 36);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Stem>("\"../x\"").is_err());
        let stem: Stem = serde_json::from_str("\"v1\"").unwrap();
        assert_eq!(stem.as_str(), "v1");
    }
}

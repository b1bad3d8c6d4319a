//! Word frequency tables.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Token to count. Serializes as a JSON object with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FrequencyTable(pub BTreeMap<String, u64>);

impl FrequencyTable {
    /// Count tokens. Surrounding whitespace is trimmed and blank tokens are
    /// ignored, since segmenters emit the spaces between words as tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, token: &str) -> u64 {
        self.0.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// The `n` most frequent tokens, ties broken alphabetically.
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_sorts() {
        let table = FrequencyTable::from_tokens(["world", " ", "hello", "world", ""]);
        assert_eq!(table.get("world"), 2);
        assert_eq!(table.get("hello"), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.total(), 3);
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"{"hello":1,"world":2}"#);
    }

    #[test]
    fn top_breaks_ties_alphabetically() {
        let table = FrequencyTable::from_tokens(["b", "a", "c", "c"]);
        assert_eq!(table.top(2), vec![("c", 2), ("a", 1)]);
    }
}

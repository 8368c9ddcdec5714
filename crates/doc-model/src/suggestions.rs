//! Payload produced by the upstream quote suggester.
//!
//! The highlighter only ever consumes the flattened quote strings; criteria,
//! strengths and notes are carried so callers can filter before matching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum SuggestionsError {
    #[error("invalid suggestions payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedQuote {
    pub quote: String,
    #[serde(default)]
    pub strength: Strength,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default)]
    pub by_criterion: BTreeMap<String, Vec<SuggestedQuote>>,
    #[serde(default)]
    pub notes: String,
}

impl Suggestions {
    pub fn from_json(bytes: &[u8]) -> Result<Self, SuggestionsError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Flatten to quote strings.
    ///
    /// `criteria` restricts to the listed criterion ids (all when `None`).
    /// Quotes are trimmed; empty and repeated quotes are dropped.
    pub fn quotes(&self, criteria: Option<&[String]>, min_strength: Strength) -> Vec<String> {
        let mut quotes: Vec<String> = Vec::new();

        for (criterion, items) in &self.by_criterion {
            if let Some(wanted) = criteria {
                if !wanted.iter().any(|id| id == criterion) {
                    continue;
                }
            }

            for item in items {
                if item.strength < min_strength {
                    continue;
                }
                let quote = item.quote.trim();
                if quote.is_empty() || quotes.iter().any(|existing| existing == quote) {
                    continue;
                }
                quotes.push(quote.to_owned());
            }
        }

        quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "by_criterion": {
            "3": [
                {"quote": "  internationally acclaimed  ", "strength": "high"},
                {"quote": "a fine evening", "strength": "low"}
            ],
            "2": [
                {"quote": "starring role"},
                {"quote": "internationally acclaimed", "strength": "medium"},
                {"quote": "   "}
            ]
        },
        "notes": "two criteria"
    }"#;

    #[test]
    fn flattens_in_criterion_order_without_repeats() {
        let suggestions = Suggestions::from_json(PAYLOAD.as_bytes()).expect("valid payload");

        assert_eq!(suggestions.notes, "two criteria");
        assert_eq!(
            suggestions.quotes(None, Strength::Low),
            vec!["starring role", "internationally acclaimed", "a fine evening"]
        );
    }

    #[test]
    fn filters_by_criterion_and_strength() {
        let suggestions = Suggestions::from_json(PAYLOAD.as_bytes()).expect("valid payload");

        let only_three = vec!["3".to_owned()];
        assert_eq!(
            suggestions.quotes(Some(&only_three), Strength::Low),
            vec!["internationally acclaimed", "a fine evening"]
        );
        assert_eq!(
            suggestions.quotes(None, Strength::High),
            vec!["internationally acclaimed"]
        );
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = Suggestions::from_json(b"{not json").expect_err("should fail");
        assert!(err.to_string().contains("invalid suggestions payload"));
    }
}

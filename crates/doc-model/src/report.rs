use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Hit count of one requested quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteCount {
    pub quote: String,
    pub hits: usize,
}

/// Per-quote hit counts in input order.
///
/// Serialises as a JSON object keyed by the exact supplied quote strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerQuote(Vec<QuoteCount>);

impl PerQuote {
    pub fn iter(&self) -> impl Iterator<Item = &QuoteCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, quote: &str) -> Option<usize> {
        self.0.iter().find(|entry| entry.quote == quote).map(|entry| entry.hits)
    }
}

impl Serialize for PerQuote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.quote, &entry.hits)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PerQuote {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PerQuoteVisitor;

        impl<'de> Visitor<'de> for PerQuoteVisitor {
            type Value = PerQuote;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of quote to hit count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PerQuote, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((quote, hits)) = access.next_entry::<String, usize>()? {
                    entries.push(QuoteCount { quote, hits });
                }
                Ok(PerQuote(entries))
            }
        }

        deserializer.deserialize_map(PerQuoteVisitor)
    }
}

/// Outcome of one highlight invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    per_quote: PerQuote,
    total_hits: usize,
}

impl Report {
    /// Build a report from `(quote, hits)` pairs in input order.
    ///
    /// A quote listed more than once keeps its first position and first count;
    /// `total_hits` is the sum over the remaining entries.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut entries: Vec<QuoteCount> = Vec::new();
        for (quote, hits) in counts {
            let quote = quote.into();
            if entries.iter().any(|entry| entry.quote == quote) {
                continue;
            }
            entries.push(QuoteCount { quote, hits });
        }

        let total_hits = entries.iter().map(|entry| entry.hits).sum();
        Self { per_quote: PerQuote(entries), total_hits }
    }

    pub fn per_quote(&self) -> &PerQuote {
        &self.per_quote
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn get(&self, quote: &str) -> Option<usize> {
        self.per_quote.get(quote)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuoteCount> {
        self.per_quote.iter()
    }

    /// Quotes that were requested but found nowhere, in input order.
    pub fn zero_hit_quotes(&self) -> Vec<&str> {
        self.per_quote
            .iter()
            .filter(|entry| entry.hits == 0)
            .map(|entry| entry.quote.as_str())
            .collect()
    }
}

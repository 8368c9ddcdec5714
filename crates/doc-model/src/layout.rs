use crate::geometry::{BoundingBox, PageSize};
use serde::{Deserialize, Serialize};

/// A positioned run of extracted text.
///
/// Spans are word-like: the extractor breaks runs at whitespace and at
/// visible gaps, so one span never crosses a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Raw glyph-derived text (may contain ligatures, non-breaking spaces)
    pub text: String,

    pub bbox: BoundingBox,

    pub page_index: u32,

    /// Position in reading order on the page
    pub order: u32,

    /// Visual line on the page, counted from the top
    pub line: u32,
}

/// Extracted text of one page, spans in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: u32,
    pub size: PageSize,
    pub spans: Vec<TextSpan>,
}

impl PageLayout {
    pub fn empty(page_index: u32, size: PageSize) -> Self {
        Self { page_index, size, spans: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Page text with spans joined by spaces and lines by newlines.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        let mut current_line = None;

        for span in &self.spans {
            match current_line {
                Some(line) if line == span.line => text.push(' '),
                Some(_) => text.push('\n'),
                None => {}
            }
            text.push_str(&span.text);
            current_line = Some(span.line);
        }

        text
    }

    /// Number of distinct visual lines.
    pub fn line_count(&self) -> usize {
        self.spans.last().map(|span| span.line as usize + 1).unwrap_or(0)
    }
}

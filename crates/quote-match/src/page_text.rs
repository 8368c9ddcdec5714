use crate::normalize::normalize;
use doc_model::PageLayout;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    start: usize,
    end: usize,
    span_index: usize,
}

/// Normalised text of one page plus the map from byte ranges back to spans.
///
/// Span texts are joined with single spaces; spans that normalise to nothing
/// are left out. A span ending in a hyphen (or soft hyphen) that is followed
/// by a span on a later line is joined to it without the hyphen or the space,
/// so words broken across lines read as one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    text: String,
    segments: Vec<Segment>,
}

impl PageText {
    pub fn build(layout: &PageLayout) -> Self {
        let words: Vec<(usize, String)> = layout
            .spans
            .iter()
            .enumerate()
            .map(|(span_index, span)| (span_index, normalize(&span.text)))
            .filter(|(_, normalized)| !normalized.is_empty())
            .collect();

        let mut text = String::new();
        let mut segments = Vec::with_capacity(words.len());
        let mut glue_next = false;

        for (position, (span_index, normalized)) in words.iter().enumerate() {
            if !text.is_empty() && !glue_next {
                text.push(' ');
            }

            let next_line = words
                .get(position + 1)
                .and_then(|(next, _)| layout.spans.get(*next))
                .map(|next| next.line);
            let breaks_line = next_line.is_some_and(|line| line > layout.spans[*span_index].line);
            let word = match line_end_hyphen(&layout.spans[*span_index].text, normalized) {
                Some(stem) if breaks_line => {
                    glue_next = true;
                    stem
                }
                _ => {
                    glue_next = false;
                    normalized.as_str()
                }
            };

            let start = text.len();
            text.push_str(word);
            segments.push(Segment { start, end: text.len(), span_index: *span_index });
        }

        Self { text, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Indices of the spans whose text overlaps `range`, in page order.
    pub fn spans_in(&self, range: Range<usize>) -> Vec<usize> {
        let first = self.segments.partition_point(|segment| segment.end <= range.start);

        self.segments[first..]
            .iter()
            .take_while(|segment| segment.start < range.end)
            .map(|segment| segment.span_index)
            .collect()
    }
}

/// The word without its trailing hyphen, when it ends in one.
///
/// Soft hyphens are already gone from `normalized`, so they are detected on
/// the raw span text. A bare `-` is punctuation, not a broken word.
fn line_end_hyphen<'a>(raw: &str, normalized: &'a str) -> Option<&'a str> {
    if raw.trim_end().ends_with('\u{00AD}') {
        return Some(normalized);
    }

    normalized.strip_suffix('-').filter(|stem| !stem.is_empty() && !stem.ends_with('-'))
}

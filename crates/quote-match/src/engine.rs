use crate::normalize::normalize;
use crate::page_text::PageText;
use doc_model::{BoundingBox, HitRegion, PageLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Quote {
    original: String,
    normalized: String,
}

/// Caller quotes with their normalised search keys, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteSet {
    quotes: Vec<Quote>,
}

impl QuoteSet {
    pub fn new<S: AsRef<str>>(quotes: &[S]) -> Self {
        let quotes = quotes
            .iter()
            .map(|quote| {
                let original = quote.as_ref().to_owned();
                let normalized = normalize(&original);
                if normalized.is_empty() {
                    tracing::debug!(quote = %original, "quote is blank after normalisation");
                }
                Quote { original, normalized }
            })
            .collect();

        Self { quotes }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Original strings, in input order.
    pub fn originals(&self) -> impl Iterator<Item = &str> {
        self.quotes.iter().map(|quote| quote.original.as_str())
    }

    pub fn original(&self, index: usize) -> Option<&str> {
        self.quotes.get(index).map(|quote| quote.original.as_str())
    }
}

/// Every occurrence of every quote on one page.
///
/// Occurrences of one quote never overlap each other; the search resumes
/// after the end of each match. Hits are ordered by quote index, then by
/// position on the page.
pub fn match_page(layout: &PageLayout, quotes: &QuoteSet) -> Vec<HitRegion> {
    let page = PageText::build(layout);
    if page.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (quote_index, quote) in quotes.quotes.iter().enumerate() {
        if quote.normalized.is_empty() || quote.normalized.len() > page.as_str().len() {
            continue;
        }

        let before = hits.len();
        for (start, matched) in page.as_str().match_indices(quote.normalized.as_str()) {
            let spans = page.spans_in(start..start + matched.len());
            let rects = line_rects(layout, &spans);
            if rects.is_empty() {
                continue;
            }

            hits.push(HitRegion {
                page_index: layout.page_index,
                rects,
                quote_index,
                quote: quote.original.clone(),
            });
        }

        if hits.len() > before {
            tracing::debug!(
                page = layout.page_index,
                quote_index,
                occurrences = hits.len() - before,
                "quote matched"
            );
        }
    }

    hits
}

/// Union of the touched spans on each visual line, top line first.
fn line_rects(layout: &PageLayout, span_indices: &[usize]) -> Vec<BoundingBox> {
    let mut rects: Vec<(u32, BoundingBox)> = Vec::new();

    for span in span_indices.iter().filter_map(|index| layout.spans.get(*index)) {
        match rects.iter_mut().find(|(line, _)| *line == span.line) {
            Some((_, rect)) => *rect = rect.union(&span.bbox),
            None => rects.push((span.line, span.bbox)),
        }
    }

    rects.sort_by_key(|(line, _)| *line);
    rects.into_iter().map(|(_, rect)| rect).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{PageSize, TextSpan};

    /// Lay out words line by line: 40pt per word, 14pt per line.
    fn layout(lines: &[&[&str]]) -> PageLayout {
        let mut spans = Vec::new();
        for (line, words) in lines.iter().enumerate() {
            for (column, word) in words.iter().enumerate() {
                spans.push(TextSpan {
                    text: (*word).to_owned(),
                    bbox: BoundingBox::new(
                        72.0 + column as f32 * 40.0,
                        700.0 - line as f32 * 14.0,
                        36.0,
                        12.0,
                    ),
                    page_index: 0,
                    order: spans.len() as u32,
                    line: line as u32,
                });
            }
        }
        PageLayout { page_index: 0, size: PageSize::default(), spans }
    }

    #[test]
    fn single_line_phrase_yields_one_rectangle() {
        let page = layout(&[&["an", "internationally", "acclaimed", "performer"]]);
        let hits = match_page(&page, &QuoteSet::new(&["internationally acclaimed"]));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rects, vec![BoundingBox::new(112.0, 700.0, 76.0, 12.0)]);
        assert_eq!(hits[0].quote, "internationally acclaimed");
        assert_eq!(hits[0].quote_index, 0);
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let page = layout(&[&["ab", "ab", "ab"]]);
        assert_eq!(match_page(&page, &QuoteSet::new(&["ab"])).len(), 3);

        let page = layout(&[&["aaaa"]]);
        assert_eq!(match_page(&page, &QuoteSet::new(&["aa"])).len(), 2);
    }

    #[test]
    fn matches_across_lines_with_one_rect_per_line() {
        let page = layout(&[&["the", "starring"], &["role", "of"]]);
        let hits = match_page(&page, &QuoteSet::new(&["Starring   ROLE"]));

        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].rects,
            vec![BoundingBox::new(112.0, 700.0, 36.0, 12.0), BoundingBox::new(72.0, 686.0, 36.0, 12.0)]
        );
    }

    #[test]
    fn partial_span_contributes_whole_box() {
        let page = layout(&[&["unbelievable"]]);
        let hits = match_page(&page, &QuoteSet::new(&["believ"]));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rects, vec![BoundingBox::new(72.0, 700.0, 36.0, 12.0)]);
    }

    #[test]
    fn blank_long_and_missing_quotes_have_no_hits() {
        let page = layout(&[&["short", "page"]]);
        let quotes = QuoteSet::new(&["   ", "a much longer quote than the page holds", "absent"]);

        assert!(match_page(&page, &quotes).is_empty());
    }

    #[test]
    fn duplicate_quotes_match_independently() {
        let page = layout(&[&["encore", "encore"]]);
        let hits = match_page(&page, &QuoteSet::new(&["encore", "ENCORE"]));

        let indices: Vec<usize> = hits.iter().map(|hit| hit.quote_index).collect();
        assert_eq!(indices, vec![0, 0, 1, 1]);
        assert_eq!(hits[2].quote, "ENCORE");
    }

    #[test]
    fn typographic_differences_still_match() {
        let page = layout(&[&["\u{201C}it\u{2019}s", "a", "\u{FB01}ne", "day\u{201D}"]]);
        let hits = match_page(&page, &QuoteSet::new(&["\"It's a fine day\""]));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rects.len(), 1);
    }
}

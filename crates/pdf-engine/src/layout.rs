//! Glyph to word to line assembly.

use crate::content::Glyph;
use doc_model::{BoundingBox, HighlightSettings, TextSpan};
use std::cmp::Ordering;

/// Glyph grouping thresholds, as fractions of the font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub word_gap_ratio: f32,
    pub line_tolerance_ratio: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self { word_gap_ratio: 0.2, line_tolerance_ratio: 0.5 }
    }
}

impl From<&HighlightSettings> for LayoutOptions {
    fn from(settings: &HighlightSettings) -> Self {
        Self {
            word_gap_ratio: settings.word_gap_ratio.max(0.0),
            line_tolerance_ratio: settings.line_tolerance_ratio.max(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct Word {
    text: String,
    bbox: BoundingBox,
    baseline: f32,
    font_size: f32,
    /// Page-space x where the next glyph is expected
    end_x: f32,
}

impl Word {
    fn start(glyph: Glyph) -> Self {
        Self {
            end_x: glyph.bbox.right(),
            text: glyph.text,
            bbox: glyph.bbox,
            baseline: glyph.baseline,
            font_size: glyph.font_size,
        }
    }

    fn accepts(&self, glyph: &Glyph, options: &LayoutOptions) -> bool {
        if glyph.break_before {
            return false;
        }

        let size = self.font_size.max(glyph.font_size).max(1.0);
        if (glyph.baseline - self.baseline).abs() > options.line_tolerance_ratio * size {
            return false;
        }

        let gap = glyph.x - self.end_x;
        gap <= options.word_gap_ratio * size && gap >= -0.5 * size
    }

    fn push(&mut self, glyph: Glyph) {
        self.text.push_str(&glyph.text);
        self.bbox = self.bbox.union(&glyph.bbox);
        self.end_x = glyph.bbox.right();
        self.font_size = self.font_size.max(glyph.font_size);
    }
}

/// Build reading-order spans for one page from its glyphs.
pub(crate) fn assemble(glyphs: Vec<Glyph>, page_index: u32, options: &LayoutOptions) -> Vec<TextSpan> {
    let words = group_words(glyphs, options);
    let lines = group_lines(words, options);

    let mut spans = Vec::new();
    for (line_index, line) in lines.into_iter().enumerate() {
        for word in line {
            spans.push(TextSpan {
                text: word.text,
                bbox: word.bbox,
                page_index,
                order: spans.len() as u32,
                line: line_index as u32,
            });
        }
    }
    spans
}

fn group_words(glyphs: Vec<Glyph>, options: &LayoutOptions) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;

    for glyph in glyphs {
        if glyph.is_space {
            words.extend(current.take());
            continue;
        }

        match current.as_mut() {
            Some(word) if word.accepts(&glyph, options) => word.push(glyph),
            _ => {
                words.extend(current.take());
                current = Some(Word::start(glyph));
            }
        }
    }

    words.extend(current);
    words
}

fn group_lines(words: Vec<Word>, options: &LayoutOptions) -> Vec<Vec<Word>> {
    let mut ordered: Vec<(usize, Word)> = words.into_iter().enumerate().collect();
    ordered.sort_by(|(left_index, left), (right_index, right)| {
        right.baseline.total_cmp(&left.baseline).then(left_index.cmp(right_index))
    });

    let mut lines: Vec<(f32, f32, Vec<(usize, Word)>)> = Vec::new();
    for (index, word) in ordered {
        match lines.last_mut() {
            Some((baseline, size, members))
                if (word.baseline - *baseline).abs()
                    <= options.line_tolerance_ratio * size.max(word.font_size).max(1.0) =>
            {
                *size = size.max(word.font_size);
                members.push((index, word));
            }
            _ => lines.push((word.baseline, word.font_size, vec![(index, word)])),
        }
    }

    lines
        .into_iter()
        .map(|(_, _, mut members)| {
            members.sort_by(|(left_index, left), (right_index, right)| {
                match left.bbox.x.total_cmp(&right.bbox.x) {
                    Ordering::Equal => left_index.cmp(right_index),
                    other => other,
                }
            });
            members.into_iter().map(|(_, word)| word).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(text: &str, x: f32, baseline: f32, width: f32) -> Glyph {
        Glyph {
            text: text.to_owned(),
            bbox: BoundingBox::new(x, baseline - 2.0, width, 10.0),
            x,
            baseline,
            font_size: 10.0,
            is_space: text.trim().is_empty(),
            break_before: false,
        }
    }

    fn texts(spans: &[TextSpan]) -> Vec<(&str, u32)> {
        spans.iter().map(|span| (span.text.as_str(), span.line)).collect()
    }

    #[test]
    fn splits_words_at_spaces_and_gaps() {
        let glyphs = vec![
            glyph("a", 0.0, 700.0, 5.0),
            glyph("b", 5.0, 700.0, 5.0),
            glyph(" ", 10.0, 700.0, 3.0),
            glyph("c", 13.0, 700.0, 5.0),
            // 4pt gap is wider than 0.2 × 10pt
            glyph("d", 22.0, 700.0, 5.0),
        ];

        let spans = assemble(glyphs, 0, &LayoutOptions::default());
        assert_eq!(texts(&spans), vec![("ab", 0), ("c", 0), ("d", 0)]);
        assert_eq!(spans[0].bbox, BoundingBox::new(0.0, 698.0, 10.0, 10.0));
    }

    #[test]
    fn orders_lines_top_to_bottom_and_words_left_to_right() {
        let glyphs = vec![
            glyph("second", 0.0, 680.0, 30.0),
            glyph("right", 100.0, 700.0, 25.0),
            glyph("left", 0.0, 701.0, 20.0),
        ];

        let spans = assemble(glyphs, 2, &LayoutOptions::default());
        assert_eq!(texts(&spans), vec![("left", 0), ("right", 0), ("second", 1)]);
        assert!(spans.iter().all(|span| span.page_index == 2));
        assert_eq!(spans.iter().map(|span| span.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn forced_break_and_backwards_jump_start_new_words() {
        let mut broken = glyph("y", 5.0, 700.0, 5.0);
        broken.break_before = true;
        let glyphs = vec![
            glyph("x", 0.0, 700.0, 5.0),
            broken,
            glyph("z", 50.0, 700.0, 5.0),
            glyph("w", 20.0, 700.0, 5.0),
        ];

        let spans = assemble(glyphs, 0, &LayoutOptions::default());
        assert_eq!(texts(&spans), vec![("x", 0), ("y", 0), ("w", 0), ("z", 0)]);
    }

    #[test]
    fn no_glyphs_means_no_spans() {
        assert!(assemble(Vec::new(), 0, &LayoutOptions::default()).is_empty());
    }
}

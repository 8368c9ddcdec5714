use crate::geometry::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationStyle {
    /// Translucent `/Highlight` annotation, one per region
    #[default]
    Highlight,
    /// Stroked `/Square` outline, one per rectangle
    Box,
}

/// Tunables for extraction, deduplication and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSettings {
    pub style: AnnotationStyle,

    /// Overrides the per-style default colour
    pub color: Option<Color>,

    pub opacity: f32,

    pub stroke_width: f32,

    /// Written to the annotation `/T` entry
    pub author: String,

    /// Rectangle intersections at or below this area (pt²) do not merge regions
    pub overlap_tolerance: f32,

    /// Horizontal gap, as a fraction of font size, that splits two words
    pub word_gap_ratio: f32,

    /// Baseline distance, as a fraction of font size, tolerated within a line
    pub line_tolerance_ratio: f32,

    /// Process pages on the rayon pool
    pub parallel: bool,

    /// Truncation limit for plain text extraction
    pub max_text_chars: usize,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            style: AnnotationStyle::Highlight,
            color: None,
            opacity: 0.4,
            stroke_width: 1.5,
            author: "Quotemark".to_owned(),
            overlap_tolerance: 0.0,
            word_gap_ratio: 0.2,
            line_tolerance_ratio: 0.5,
            parallel: true,
            max_text_chars: 120_000,
        }
    }
}

impl HighlightSettings {
    /// Effective colour: explicit override or the style's default.
    pub fn effective_color(&self) -> Color {
        self.color.unwrap_or(match self.style {
            AnnotationStyle::Highlight => Color::YELLOW,
            AnnotationStyle::Box => Color::RED,
        })
    }

    pub fn clamped_opacity(&self) -> f32 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

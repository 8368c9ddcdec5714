//! Shared data model for quote highlighting.
//!
//! Everything that crosses a crate boundary lives here: page geometry,
//! extracted spans, hit regions, the per-quote report, settings, and the
//! suggester payload.

pub mod geometry;
pub mod hits;
pub mod layout;
pub mod report;
pub mod settings;
pub mod suggestions;

pub use geometry::{BoundingBox, Color, PageSize};
pub use hits::{DrawRegion, HitRegion};
pub use layout::{PageLayout, TextSpan};
pub use report::{PerQuote, QuoteCount, Report};
pub use settings::{AnnotationStyle, HighlightSettings};
pub use suggestions::{Strength, SuggestedQuote, Suggestions, SuggestionsError};

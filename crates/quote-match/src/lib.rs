//! Locating quotes in extracted page text.
//!
//! Pages and quotes go through the same [`normalize`] pipeline, occurrences
//! are found by literal search over the normalised page arena and projected
//! back onto span geometry. Overlapping hits are folded for drawing by
//! [`deduplicate`]; counting always uses the raw hits.

pub mod dedup;
pub mod engine;
pub mod normalize;
pub mod page_text;
pub mod report;

pub use dedup::deduplicate;
pub use engine::{match_page, QuoteSet};
pub use normalize::normalize;
pub use page_text::PageText;
pub use report::build_report;

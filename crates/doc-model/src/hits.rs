use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// Geometric footprint of one occurrence of one quote.
///
/// Immutable once produced by the match engine; `rects` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRegion {
    pub page_index: u32,

    /// One rectangle per visual line the occurrence touches, top line first
    pub rects: Vec<BoundingBox>,

    /// Index of the quote in the caller's input list
    pub quote_index: usize,

    /// The quote as supplied by the caller
    pub quote: String,
}

impl HitRegion {
    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::envelope(&self.rects)
    }
}

/// A deduplicated region ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRegion {
    pub page_index: u32,
    pub rects: Vec<BoundingBox>,

    /// Input indices of every quote that contributed, ascending and unique
    pub quote_indices: Vec<usize>,
}

use crate::engine::QuoteSet;
use doc_model::{HitRegion, Report};

/// Per-quote occurrence counts, taken before deduplication.
///
/// Every quote appears, including those without hits. A quote supplied more
/// than once is reported once.
pub fn build_report(quotes: &QuoteSet, hits: &[HitRegion]) -> Report {
    let mut counts = vec![0usize; quotes.len()];
    for hit in hits {
        if let Some(count) = counts.get_mut(hit.quote_index) {
            *count += 1;
        }
    }

    Report::from_counts(quotes.originals().zip(counts))
}

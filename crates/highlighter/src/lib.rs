//! Quote highlighting pipeline.
//!
//! Parse once, extract and match every page (in parallel unless disabled),
//! count hits, fold overlapping hits into drawable regions, then write one
//! annotation set into the document and serialise it.

pub mod cancel;

pub use cancel::CancellationToken;
pub use doc_model::{AnnotationStyle, HighlightSettings, Report};

use doc_model::{DrawRegion, HitRegion};
use pdf_engine::{
    Annotation, Appearance, LayoutOptions, LopdfEngine, OpenSource, PageSource, PdfEngine,
    PdfEngineError,
};
use quote_match::{build_report, deduplicate, match_page, QuoteSet};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("unable to parse PDF: {0}")]
    DocumentParse(#[source] PdfEngineError),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("unable to write annotated PDF: {0}")]
    Render(#[source] PdfEngineError),
    #[error("highlighting was cancelled")]
    Cancelled,
}

impl HighlightError {
    /// The input could not be read as a usable PDF.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::DocumentParse(_) | Self::EncryptedUnsupported)
    }

    fn from_open(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::EncryptedUnsupported => Self::EncryptedUnsupported,
            other => Self::DocumentParse(other),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlighted {
    /// The annotated PDF
    pub document: Vec<u8>,
    pub report: Report,
    /// Deduplicated regions drawn across all pages
    pub drawn_regions: usize,
}

/// Highlight `quotes` with default settings.
pub fn highlight<S: AsRef<str>>(
    document: &[u8],
    quotes: &[S],
) -> Result<Highlighted, HighlightError> {
    highlight_with(document, quotes, &HighlightSettings::default(), &CancellationToken::new())
}

pub fn highlight_with<S: AsRef<str>>(
    document: &[u8],
    quotes: &[S],
    settings: &HighlightSettings,
    cancel: &CancellationToken,
) -> Result<Highlighted, HighlightError> {
    let started = Instant::now();
    let quotes = QuoteSet::new(quotes);

    let mut engine = LopdfEngine::new();
    let handle =
        engine.open(OpenSource::Bytes(document.to_vec())).map_err(HighlightError::from_open)?;
    let sources = engine.page_sources(handle).map_err(HighlightError::DocumentParse)?;

    let hits = find_hits(&sources, &quotes, settings, cancel)?;
    let report = build_report(&quotes, &hits);
    let regions = deduplicate(&hits, settings.overlap_tolerance);

    if cancel.is_cancelled() {
        return Err(HighlightError::Cancelled);
    }

    let appearance = Appearance::from(settings);
    for (page_index, page_regions) in regions_by_page(&regions) {
        let annotations: Vec<Annotation> =
            page_regions.iter().map(|region| annotation_for(region, &quotes)).collect();
        engine
            .annotate(handle, page_index, &annotations, &appearance)
            .map_err(HighlightError::Render)?;
    }

    let output = engine.save(handle).map_err(HighlightError::Render)?;
    engine.close(handle).map_err(HighlightError::Render)?;

    tracing::info!(
        pages = sources.len(),
        quotes = quotes.len(),
        total_hits = report.total_hits(),
        drawn_regions = regions.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "highlighted document"
    );

    Ok(Highlighted { document: output, report, drawn_regions: regions.len() })
}

fn find_hits(
    sources: &[PageSource],
    quotes: &QuoteSet,
    settings: &HighlightSettings,
    cancel: &CancellationToken,
) -> Result<Vec<HitRegion>, HighlightError> {
    let options = LayoutOptions::from(settings);

    let per_page = |source: &PageSource| -> Result<Vec<HitRegion>, HighlightError> {
        if cancel.is_cancelled() {
            return Err(HighlightError::Cancelled);
        }
        if quotes.is_empty() {
            return Ok(Vec::new());
        }

        let layout = source.extract(&options);
        let hits = match_page(&layout, quotes);
        tracing::debug!(
            page = source.page_index(),
            spans = layout.spans.len(),
            lines = layout.line_count(),
            hits = hits.len(),
            "page matched"
        );
        Ok(hits)
    };

    let pages: Vec<Vec<HitRegion>> = if settings.parallel {
        sources.par_iter().map(per_page).collect::<Result<_, _>>()?
    } else {
        sources.iter().map(per_page).collect::<Result<_, _>>()?
    };

    Ok(pages.into_iter().flatten().collect())
}

fn regions_by_page(regions: &[DrawRegion]) -> BTreeMap<u32, Vec<&DrawRegion>> {
    let mut pages: BTreeMap<u32, Vec<&DrawRegion>> = BTreeMap::new();
    for region in regions {
        pages.entry(region.page_index).or_default().push(region);
    }
    pages
}

/// Popup text lists every quote that contributed to the region.
fn annotation_for(region: &DrawRegion, quotes: &QuoteSet) -> Annotation {
    let contents: Vec<&str> =
        region.quote_indices.iter().filter_map(|index| quotes.original(*index)).collect();

    Annotation { rects: region.rects.clone(), contents: contents.join("\n") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::BoundingBox;

    #[test]
    fn encrypted_open_error_is_its_own_variant() {
        assert!(matches!(
            HighlightError::from_open(PdfEngineError::EncryptedUnsupported),
            HighlightError::EncryptedUnsupported
        ));
        let parse = HighlightError::from_open(PdfEngineError::InvalidHandle(1));
        assert!(parse.is_parse_error());
        assert!(!HighlightError::Cancelled.is_parse_error());
    }

    #[test]
    fn annotation_contents_join_contributing_quotes() {
        let quotes = QuoteSet::new(&["internationally acclaimed", "acclaimed", "unused"]);
        let region = DrawRegion {
            page_index: 0,
            rects: vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)],
            quote_indices: vec![0, 1],
        };

        let annotation = annotation_for(&region, &quotes);
        assert_eq!(annotation.contents, "internationally acclaimed\nacclaimed");
        assert_eq!(annotation.rects, region.rects);
    }

    #[test]
    fn regions_are_grouped_per_page_in_order() {
        let region = |page_index| DrawRegion {
            page_index,
            rects: vec![BoundingBox::new(0.0, 0.0, 1.0, 1.0)],
            quote_indices: vec![0],
        };
        let regions = vec![region(2), region(0), region(2)];

        let grouped = regions_by_page(&regions);
        let pages: Vec<(u32, usize)> =
            grouped.iter().map(|(page, items)| (*page, items.len())).collect();
        assert_eq!(pages, vec![(0, 1), (2, 2)]);
    }
}

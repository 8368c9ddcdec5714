//! PDF access on top of lopdf: page layout extraction and annotation writing.

mod annotate;
mod content;
mod fonts;
mod layout;
mod objects;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use annotate::{Annotation, Appearance};
pub use layout::LayoutOptions;

use content::{Matrix, ResourceCollector, Resources};
use doc_model::{PageLayout, PageSize};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default cap for [`extract_text`].
pub const DEFAULT_MAX_TEXT_CHARS: usize = 120_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("unable to write PDF: {0}")]
    Render(String),
}

/// Everything needed to extract one page's layout, detached from the
/// document so pages can be processed on any thread.
#[derive(Debug, Clone)]
pub struct PageSource {
    page_index: u32,
    size: PageSize,
    content: Vec<u8>,
    resources: Resources,
    base: Matrix,
}

impl PageSource {
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// Reading-order spans of the page. Pages without text give an empty layout.
    pub fn extract(&self, options: &LayoutOptions) -> PageLayout {
        if self.content.is_empty() {
            return PageLayout::empty(self.page_index, self.size);
        }

        let glyphs = content::interpret(&self.content, &self.resources, self.base);
        let spans = layout::assemble(glyphs, self.page_index, options);
        tracing::trace!(page = self.page_index, spans = spans.len(), "page layout extracted");

        PageLayout { page_index: self.page_index, size: self.size, spans }
    }
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_sources(&self, handle: DocumentHandle) -> Result<Vec<PageSource>, PdfEngineError>;
    fn annotate(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        annotations: &[Annotation],
        appearance: &Appearance,
    ) -> Result<usize, PdfEngineError>;
    fn save(&mut self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    fn extract_layouts(
        &self,
        handle: DocumentHandle,
        options: &LayoutOptions,
    ) -> Result<Vec<PageLayout>, PdfEngineError> {
        Ok(self.page_sources(handle)?.iter().map(|source| source.extract(options)).collect())
    }
}

#[derive(Debug)]
struct DocumentRecord {
    document: Document,
    page_ids: Vec<ObjectId>,
    page_boxes: Vec<MediaBox>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    origin: (f32, f32),
    size: PageSize,
}

impl Default for MediaBox {
    fn default() -> Self {
        Self { origin: (0.0, 0.0), size: PageSize::default() }
    }
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(err) if trailer_declares_encryption(bytes) => {
                tracing::debug!(error = %err, "encrypted document failed to load");
                return Err(PdfEngineError::EncryptedUnsupported);
            }
            Err(err) => return Err(err.into()),
        };
        if document.trailer.has(b"Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        let page_boxes =
            page_ids.iter().map(|page_id| Self::media_box(&document, *page_id)).collect();

        Ok(DocumentRecord { document, page_ids, page_boxes })
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
        let values = match objects::inherited(doc, page_id, b"MediaBox") {
            Some(Object::Array(items)) if items.len() == 4 => items
                .iter()
                .map(|item| objects::resolve(doc, item).and_then(objects::number))
                .collect::<Option<Vec<f32>>>(),
            _ => None,
        };

        match values.as_deref() {
            Some(&[x0, y0, x1, y1]) => MediaBox {
                origin: (x0.min(x1), y0.min(y1)),
                size: PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
            },
            _ => {
                tracing::debug!(?page_id, "missing or malformed MediaBox, assuming US Letter");
                MediaBox::default()
            }
        }
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl DocumentRecord {
    fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        self.page_ids.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_ids.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::load(&bytes)?;
        tracing::debug!(pages = record.page_ids.len(), bytes = bytes.len(), "opened document");

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_ids.len() as u32)
    }

    fn page_sources(&self, handle: DocumentHandle) -> Result<Vec<PageSource>, PdfEngineError> {
        let record = self.record(handle)?;
        let doc = &record.document;
        let mut collector = ResourceCollector::new();

        let sources = record
            .page_ids
            .iter()
            .zip(&record.page_boxes)
            .enumerate()
            .map(|(index, (page_id, media_box))| {
                let content = objects::page_content(doc, *page_id).unwrap_or_else(|| {
                    tracing::debug!(page = index, "page has no readable content stream");
                    Vec::new()
                });
                let resources = collector.gather(doc, content::page_resources(doc, *page_id));
                let (x0, y0) = media_box.origin;

                PageSource {
                    page_index: index as u32,
                    size: media_box.size,
                    content,
                    resources,
                    base: Matrix::translate(-x0, -y0),
                }
            })
            .collect();

        Ok(sources)
    }

    fn annotate(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        annotations: &[Annotation],
        appearance: &Appearance,
    ) -> Result<usize, PdfEngineError> {
        let record = self.record_mut(handle)?;
        let page_id = record.page_id(page_index)?;
        let (x0, y0) = record.page_boxes[page_index as usize].origin;

        // Annotations live in user space; layouts are relative to the MediaBox origin.
        let shifted: Vec<Annotation> = annotations
            .iter()
            .map(|annotation| Annotation {
                rects: annotation
                    .rects
                    .iter()
                    .map(|rect| doc_model::BoundingBox { x: rect.x + x0, y: rect.y + y0, ..*rect })
                    .collect(),
                contents: annotation.contents.clone(),
            })
            .collect();

        annotate::annotate_page(&mut record.document, page_id, &shifted, appearance)
    }

    fn save(&mut self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        let record = self.record_mut(handle)?;
        let mut buffer = Vec::new();
        record
            .document
            .save_to(&mut buffer)
            .map_err(|err| PdfEngineError::Render(err.to_string()))?;
        Ok(buffer)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Whether the last trailer (or cross-reference stream dictionary) names an
/// `/Encrypt` entry. Only consulted when lopdf cannot load the file.
fn trailer_declares_encryption(bytes: &[u8]) -> bool {
    let tail_start = match rfind(bytes, b"trailer") {
        Some(position) => position,
        None => match rfind(bytes, b"/XRef") {
            Some(position) => position.saturating_sub(512),
            None => return false,
        },
    };

    rfind(&bytes[tail_start..], b"/Encrypt").is_some()
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Plain text of a whole document, as handed to the quote suggester.
///
/// Spans on a line are joined by spaces, lines by `\n` and pages by a blank
/// line; the result is trimmed and cut to `max_chars` characters.
pub fn extract_text(bytes: &[u8], max_chars: usize) -> Result<String, PdfEngineError> {
    let mut engine = LopdfEngine::new();
    let handle = engine.open(OpenSource::Bytes(bytes.to_vec()))?;
    let layouts = engine.extract_layouts(handle, &LayoutOptions::default())?;
    engine.close(handle)?;

    let pages: Vec<String> = layouts.iter().map(PageLayout::plain_text).collect();
    let text = pages.join("\n\n");
    let trimmed = text.trim();

    Ok(match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].to_owned(),
        None => trimmed.to_owned(),
    })
}

//! Small synthetic PDFs for tests in this and downstream crates.
//!
//! Every document shares one Helvetica font (`/F1`, WinAnsi with the `fi`
//! and `fl` ligatures at codes 1 and 2), inherited along with the MediaBox
//! from the page tree root.

use crate::PdfEngineError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

pub const FONT_SIZE: f32 = 12.0;
pub const LEFT_MARGIN: f32 = 72.0;
pub const TOP_BASELINE: f32 = 720.0;
pub const LINE_HEIGHT: f32 = 16.0;

/// One page per entry, one text line per string, top to bottom.
pub fn text_pdf(pages: &[&[&str]]) -> Result<Vec<u8>, PdfEngineError> {
    let pages = pages
        .iter()
        .map(|lines| {
            lines
                .iter()
                .enumerate()
                .flat_map(|(index, line)| {
                    line_ops(line, LEFT_MARGIN, TOP_BASELINE - index as f32 * LINE_HEIGHT, FONT_SIZE)
                })
                .collect()
        })
        .collect();

    pdf_with_content(pages)
}

/// Operators that show `text` with `/F1` at the given baseline origin.
pub fn line_ops(text: &str, x: f32, y: f32, size: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Real(size)]),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
        Operation::new("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

/// A page that draws a line but shows no text.
pub fn graphics_only_ops() -> Vec<Operation> {
    vec![
        Operation::new("m", vec![Object::Real(72.0), Object::Real(72.0)]),
        Operation::new("l", vec![Object::Real(540.0), Object::Real(720.0)]),
        Operation::new("S", vec![]),
    ]
}

/// Build a document with one page per operation list.
pub fn pdf_with_content(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, PdfEngineError> {
    build(pages, false)
}

/// A document whose trailer declares encryption.
pub fn encrypted_pdf() -> Result<Vec<u8>, PdfEngineError> {
    build(vec![line_ops("secret", LEFT_MARGIN, TOP_BASELINE, FONT_SIZE)], true)
}

fn build(pages: Vec<Vec<Operation>>, encrypted: bool) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => dictionary! {
            "Type" => "Encoding",
            "BaseEncoding" => "WinAnsiEncoding",
            "Differences" => vec![
                1.into(),
                Object::Name(b"fi".to_vec()),
                Object::Name(b"fl".to_vec()),
            ],
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if encrypted {
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
        });
        doc.trailer.set("Encrypt", encrypt_id);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|err| PdfEngineError::Render(err.to_string()))?;
    Ok(buffer)
}

/// Encode text for `/F1`. Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{FB01}' => 1,
            '\u{FB02}' => 2,
            ' '..='~' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}'..='\u{00FF}' => ch as u32 as u8,
            _ => b'?',
        })
        .collect()
}

//! Annotation objects and their appearance streams.

use crate::PdfEngineError;
use doc_model::{AnnotationStyle, BoundingBox, Color, HighlightSettings};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fmt::Write as FmtWrite;

/// One annotation to place on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Rectangles in page space, one per visual line
    pub rects: Vec<BoundingBox>,
    /// Text shown in the viewer's annotation popup
    pub contents: String,
}

/// How annotations look, resolved from [`HighlightSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub style: AnnotationStyle,
    pub color: Color,
    /// Fill opacity for highlights; box strokes are always opaque
    pub opacity: f32,
    pub stroke_width: f32,
    pub author: String,
}

impl From<&HighlightSettings> for Appearance {
    fn from(settings: &HighlightSettings) -> Self {
        Self {
            style: settings.style,
            color: settings.effective_color(),
            opacity: settings.clamped_opacity(),
            stroke_width: if settings.stroke_width.is_finite() {
                settings.stroke_width.max(0.0)
            } else {
                1.5
            },
            author: settings.author.clone(),
        }
    }
}

type AnnotateResult<T> = Result<T, PdfEngineError>;

fn render_error(err: std::fmt::Error) -> PdfEngineError {
    PdfEngineError::Render(err.to_string())
}

/// Add `annotations` to a page. Returns the number of annotation objects written.
pub(crate) fn annotate_page(
    doc: &mut Document,
    page_id: ObjectId,
    annotations: &[Annotation],
    appearance: &Appearance,
) -> AnnotateResult<usize> {
    let mut written = 0;

    for annotation in annotations {
        let dicts = match appearance.style {
            AnnotationStyle::Highlight => highlight_annotation(doc, page_id, annotation, appearance)?
                .into_iter()
                .collect::<Vec<_>>(),
            AnnotationStyle::Box => box_annotations(doc, page_id, annotation, appearance)?,
        };

        for dict in dicts {
            let annot_id = doc.add_object(dict);
            append_annotation(doc, page_id, annot_id)?;
            written += 1;
        }
    }

    Ok(written)
}

fn highlight_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annotation: &Annotation,
    appearance: &Appearance,
) -> AnnotateResult<Option<Dictionary>> {
    let Some(envelope) = BoundingBox::envelope(&annotation.rects) else {
        return Ok(None);
    };

    let mut quad_points = Vec::with_capacity(annotation.rects.len() * 8);
    for rect in &annotation.rects {
        // Acrobat order: upper-left, upper-right, lower-left, lower-right.
        for value in [rect.x, rect.top(), rect.right(), rect.top(), rect.x, rect.y, rect.right(), rect.y] {
            quad_points.push(Object::Real(value));
        }
    }

    let ap_id = doc.add_object(appearance_stream(
        &envelope,
        highlight_stream(&annotation.rects, appearance)?,
        Some(dictionary! {
            "GS0" => dictionary! {
                "Type" => "ExtGState",
                "CA" => Object::Real(appearance.opacity),
                "ca" => Object::Real(appearance.opacity),
                "BM" => "Multiply",
            },
        }),
    ));

    let mut dict = base_annotation("Highlight", page_id, &envelope, annotation, appearance);
    dict.set("QuadPoints", Object::Array(quad_points));
    dict.set("CA", Object::Real(appearance.opacity));
    dict.set("AP", dictionary! { "N" => ap_id });
    Ok(Some(dict))
}

fn box_annotations(
    doc: &mut Document,
    page_id: ObjectId,
    annotation: &Annotation,
    appearance: &Appearance,
) -> AnnotateResult<Vec<Dictionary>> {
    let mut dicts = Vec::with_capacity(annotation.rects.len());

    for rect in &annotation.rects {
        let outer = rect.padded(appearance.stroke_width);
        let ap_id = doc.add_object(appearance_stream(&outer, box_stream(rect, appearance)?, None));

        let mut dict = base_annotation("Square", page_id, &outer, annotation, appearance);
        dict.set(
            "BS",
            dictionary! {
                "Type" => "Border",
                "W" => Object::Real(appearance.stroke_width),
                "S" => "S",
            },
        );
        dict.set("AP", dictionary! { "N" => ap_id });
        dicts.push(dict);
    }

    Ok(dicts)
}

fn base_annotation(
    subtype: &str,
    page_id: ObjectId,
    rect: &BoundingBox,
    annotation: &Annotation,
    appearance: &Appearance,
) -> Dictionary {
    let [r, g, b] = appearance.color.to_normalized_rgb();

    dictionary! {
        "Type" => "Annot",
        "Subtype" => subtype,
        "Rect" => pdf_rect(rect),
        "C" => vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        "F" => 4,
        "P" => page_id,
        "Contents" => pdf_text_string(&annotation.contents),
        "T" => pdf_text_string(&appearance.author),
    }
}

fn appearance_stream(bbox: &BoundingBox, content: String, ext_g_state: Option<Dictionary>) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => pdf_rect(bbox),
    };
    if let Some(states) = ext_g_state {
        dict.set("Resources", dictionary! { "ExtGState" => states });
    }

    Stream::new(dict, content.into_bytes())
}

/// Filled rectangles under a multiply blend.
pub(crate) fn highlight_stream(rects: &[BoundingBox], appearance: &Appearance) -> AnnotateResult<String> {
    let mut stream = String::new();
    let [r, g, b] = appearance.color.to_normalized_rgb();

    writeln!(&mut stream, "/GS0 gs").map_err(render_error)?;
    writeln!(&mut stream, "{} {} {} rg", num(r), num(g), num(b)).map_err(render_error)?;
    for rect in rects {
        writeln!(
            &mut stream,
            "{} {} {} {} re",
            num(rect.x),
            num(rect.y),
            num(rect.width),
            num(rect.height)
        )
        .map_err(render_error)?;
    }
    writeln!(&mut stream, "f").map_err(render_error)?;

    Ok(stream)
}

/// Stroked outline centred half a stroke outside the text.
pub(crate) fn box_stream(rect: &BoundingBox, appearance: &Appearance) -> AnnotateResult<String> {
    let mut stream = String::new();
    let [r, g, b] = appearance.color.to_normalized_rgb();
    let path = rect.padded(appearance.stroke_width / 2.0);

    writeln!(&mut stream, "{} {} {} RG", num(r), num(g), num(b)).map_err(render_error)?;
    writeln!(&mut stream, "{} w", num(appearance.stroke_width)).map_err(render_error)?;
    writeln!(
        &mut stream,
        "{} {} {} {} re",
        num(path.x),
        num(path.y),
        num(path.width),
        num(path.height)
    )
    .map_err(render_error)?;
    writeln!(&mut stream, "S").map_err(render_error)?;

    Ok(stream)
}

/// Round to three decimals so streams stay short and stable.
fn num(value: f32) -> f32 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn pdf_rect(rect: &BoundingBox) -> Object {
    Object::Array(rect.to_pdf_rect().into_iter().map(Object::Real).collect())
}

/// PDF text string: literal when ASCII, otherwise UTF-16BE with a byte order mark.
pub(crate) fn pdf_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Append to the page's `/Annots`, whether it is inline, indirect or absent.
pub(crate) fn append_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> AnnotateResult<()> {
    let indirect = match doc.get_dictionary(page_id)?.get(b"Annots") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    if let Some(array_id) = indirect {
        if let Ok(Object::Array(items)) = doc.get_object_mut(array_id) {
            items.push(Object::Reference(annot_id));
            return Ok(());
        }
        tracing::warn!(?array_id, "indirect /Annots is not an array, replacing it");
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if let Ok(Object::Array(items)) = page.get_mut(b"Annots") {
        items.push(Object::Reference(annot_id));
    } else {
        page.set("Annots", vec![Object::Reference(annot_id)]);
    }
    Ok(())
}

//! Content stream interpretation: text operators in, positioned glyphs out.

use crate::fonts::FontInfo;
use crate::objects::{self, get_array, get_dict, get_name, resolve};
use doc_model::BoundingBox;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments below this (thousandths of an em) separate words.
const TJ_WORD_BREAK: f32 = -200.0;

/// Glyph box extent relative to the baseline, in em.
const DESCENT: f32 = -0.2;
const ASCENT: f32 = 0.8;

/// Affine transform `[a b c d e f]`, applied to row vectors: `[x y 1] × M`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn from_values(values: [f32; 6]) -> Self {
        let [a, b, c, d, e, f] = values;
        Self { a, b, c, d, e, f }
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self { e: x, f: y, ..Self::IDENTITY }
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.a + y * self.c + self.e, x * self.b + y * self.d + self.f)
    }

    /// Length of the transformed unit y vector.
    fn vertical_scale(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

/// A form XObject with everything needed to interpret it later.
#[derive(Debug)]
pub(crate) struct FormXObject {
    content: Vec<u8>,
    matrix: Matrix,
    resources: Resources,
}

/// Fonts and forms a content stream may reference, resolved up front so the
/// interpreter does not need the document.
#[derive(Debug, Clone, Default)]
pub(crate) struct Resources {
    fonts: HashMap<Vec<u8>, Arc<FontInfo>>,
    forms: HashMap<Vec<u8>, Arc<FormXObject>>,
}

/// Shared state while gathering resources for one document.
#[derive(Default)]
pub(crate) struct ResourceCollector {
    font_cache: HashMap<ObjectId, Arc<FontInfo>>,
    visiting: HashSet<ObjectId>,
}

impl ResourceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gather(&mut self, doc: &Document, dict: Option<&Dictionary>) -> Resources {
        self.gather_at(doc, dict, 0)
    }

    fn gather_at(&mut self, doc: &Document, dict: Option<&Dictionary>, depth: usize) -> Resources {
        let mut resources = Resources::default();
        let Some(dict) = dict else {
            return resources;
        };

        if let Some(fonts) = get_dict(doc, dict, b"Font") {
            for (name, entry) in fonts.iter() {
                if let Some(font) = self.font(doc, entry) {
                    resources.fonts.insert(name.clone(), font);
                }
            }
        }

        if depth >= MAX_FORM_DEPTH {
            tracing::debug!(depth, "form nesting limit reached, ignoring nested forms");
            return resources;
        }

        if let Some(xobjects) = get_dict(doc, dict, b"XObject") {
            for (name, entry) in xobjects.iter() {
                if let Some(form) = self.form(doc, entry, &resources, depth) {
                    resources.forms.insert(name.clone(), form);
                }
            }
        }

        resources
    }

    fn font(&mut self, doc: &Document, entry: &Object) -> Option<Arc<FontInfo>> {
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(cached) = id.and_then(|id| self.font_cache.get(&id)) {
            return Some(Arc::clone(cached));
        }

        let font = match resolve(doc, entry)? {
            Object::Dictionary(dict) => Arc::new(FontInfo::from_dict(doc, dict)),
            _ => return None,
        };
        if let Some(id) = id {
            self.font_cache.insert(id, Arc::clone(&font));
        }
        Some(font)
    }

    fn form(
        &mut self,
        doc: &Document,
        entry: &Object,
        parent: &Resources,
        depth: usize,
    ) -> Option<Arc<FormXObject>> {
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(id) = id {
            if !self.visiting.insert(id) {
                tracing::debug!(?id, "form XObject references itself, skipping");
                return None;
            }
        }

        let form = self.build_form(doc, entry, parent, depth);

        if let Some(id) = id {
            self.visiting.remove(&id);
        }
        form
    }

    fn build_form(
        &mut self,
        doc: &Document,
        entry: &Object,
        parent: &Resources,
        depth: usize,
    ) -> Option<Arc<FormXObject>> {
        let Object::Stream(stream) = resolve(doc, entry)? else {
            return None;
        };
        if get_name(doc, &stream.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return None;
        }

        let content = objects::stream_content(stream)?;
        let matrix = get_array(doc, &stream.dict, b"Matrix")
            .and_then(|items| objects::matrix_values(doc, items))
            .map(Matrix::from_values)
            .unwrap_or(Matrix::IDENTITY);

        let resources = match get_dict(doc, &stream.dict, b"Resources") {
            Some(own) => self.gather_at(doc, Some(own), depth + 1),
            None => parent.clone(),
        };

        Some(Arc::new(FormXObject { content, matrix, resources }))
    }
}

/// One shown glyph in page space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub text: String,
    pub bbox: BoundingBox,
    /// Page-space origin of the glyph
    pub x: f32,
    pub baseline: f32,
    pub font_size: f32,
    pub is_space: bool,
    /// Set when a large TJ adjustment preceded this glyph
    pub break_before: bool,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
    font: Arc<FontInfo>,
    font_size: f32,
}

struct Interpreter {
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    pending_break: bool,
    fallback_font: Arc<FontInfo>,
    glyphs: Vec<Glyph>,
}

/// Interpret a page's content and return its glyphs in content order.
///
/// `base` maps user space to page space (it undoes a non-zero MediaBox origin).
pub(crate) fn interpret(content: &[u8], resources: &Resources, base: Matrix) -> Vec<Glyph> {
    let fallback_font = Arc::new(FontInfo::fallback());
    let mut interpreter = Interpreter {
        state: GraphicsState {
            ctm: base,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: Arc::clone(&fallback_font),
            font_size: 0.0,
        },
        stack: Vec::new(),
        text_matrix: Matrix::IDENTITY,
        line_matrix: Matrix::IDENTITY,
        pending_break: false,
        fallback_font,
        glyphs: Vec::new(),
    };

    interpreter.run(content, resources);
    interpreter.glyphs
}

impl Interpreter {
    fn run(&mut self, content: &[u8], resources: &Resources) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(err) => {
                tracing::warn!(%err, "unable to decode content stream");
                return;
            }
        };

        for operation in &operations {
            self.execute(operation, resources);
        }
    }

    fn execute(&mut self, operation: &Operation, resources: &Resources) {
        let operands = &operation.operands;
        let num = |index: usize| operands.get(index).and_then(objects::number);

        match operation.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = operand_matrix(operands) {
                    self.state.ctm = matrix.then(self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                let font = operands
                    .first()
                    .and_then(objects::name)
                    .and_then(|name| resources.fonts.get(name))
                    .cloned();
                self.state.font = font.unwrap_or_else(|| {
                    tracing::debug!("Tf names an unknown font, using fallback metrics");
                    Arc::clone(&self.fallback_font)
                });
                if let Some(size) = num(1) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.state.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.rise = num(0).unwrap_or(0.0),
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = operand_matrix(operands) {
                    self.text_matrix = matrix;
                    self.line_matrix = matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let (Some(word), Some(chars)) = (num(0), num(1)) {
                    self.state.word_spacing = word;
                    self.state.char_spacing = chars;
                }
                self.next_line();
                if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = operands.first() else {
                    return;
                };
                for item in items {
                    if let Some(bytes) = string_bytes(item) {
                        self.show(bytes);
                    } else if let Some(adjustment) = objects::number(item) {
                        self.adjust(adjustment);
                    }
                }
            }
            "Do" => {
                let form = operands
                    .first()
                    .and_then(objects::name)
                    .and_then(|name| resources.forms.get(name))
                    .cloned();
                if let Some(form) = form {
                    self.run_form(&form);
                }
            }
            _ => {}
        }
    }

    fn run_form(&mut self, form: &FormXObject) {
        let saved_state = self.state.clone();
        let saved_stack = std::mem::take(&mut self.stack);
        let saved_text = (self.text_matrix, self.line_matrix);

        self.state.ctm = form.matrix.then(self.state.ctm);
        self.run(&form.content, &form.resources);

        self.state = saved_state;
        self.stack = saved_stack;
        (self.text_matrix, self.line_matrix) = saved_text;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn adjust(&mut self, thousandths: f32) {
        let tx = -thousandths / 1000.0 * self.state.font_size * self.state.horizontal_scale;
        self.text_matrix = Matrix::translate(tx, 0.0).then(self.text_matrix);
        if thousandths < TJ_WORD_BREAK {
            self.pending_break = true;
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        let font = Arc::clone(&self.state.font);

        for decoded in font.decode(bytes) {
            let width = font.width(decoded.code) / 1000.0;
            let rendering = Matrix {
                a: self.state.font_size * self.state.horizontal_scale,
                b: 0.0,
                c: 0.0,
                d: self.state.font_size,
                e: 0.0,
                f: self.state.rise,
            }
            .then(self.text_matrix)
            .then(self.state.ctm);

            if let Some(text) = decoded.text {
                self.emit(text, &rendering, width);
            }

            let mut advance = width * self.state.font_size + self.state.char_spacing;
            if decoded.is_word_space {
                advance += self.state.word_spacing;
            }
            let tx = advance * self.state.horizontal_scale;
            self.text_matrix = Matrix::translate(tx, 0.0).then(self.text_matrix);
        }
    }

    fn emit(&mut self, text: String, rendering: &Matrix, width: f32) {
        let corners = [
            rendering.apply(0.0, DESCENT),
            rendering.apply(width, DESCENT),
            rendering.apply(0.0, ASCENT),
            rendering.apply(width, ASCENT),
        ];
        let (min_x, max_x, min_y, max_y) = corners.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), (x, y)| {
                (min_x.min(*x), max_x.max(*x), min_y.min(*y), max_y.max(*y))
            },
        );
        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return;
        }

        let (x, baseline) = rendering.apply(0.0, 0.0);
        let is_space = text.chars().all(char::is_whitespace);

        self.glyphs.push(Glyph {
            text,
            bbox: BoundingBox::from_corners(min_x, min_y, max_x, max_y),
            x,
            baseline,
            font_size: rendering.vertical_scale(),
            is_space,
            break_before: std::mem::take(&mut self.pending_break),
        });
    }
}

fn operand_matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut values = [0.0; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = objects::number(operand)?;
    }
    Some(Matrix::from_values(values))
}

fn string_bytes(object: &Object) -> Option<&[u8]> {
    match object {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

/// Resources dictionary of a page, following page-tree inheritance.
pub(crate) fn page_resources<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    match objects::inherited(doc, page_id, b"Resources")? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn helvetica_resources() -> Resources {
        let doc = Document::with_version("1.5");
        let fonts = dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                },
            },
        };
        ResourceCollector::new().gather(&doc, Some(&fonts))
    }

    fn text_of(glyphs: &[Glyph]) -> String {
        glyphs.iter().map(|glyph| glyph.text.as_str()).collect()
    }

    #[test]
    fn matrix_composition_applies_left_operand_first() {
        let scale = Matrix { a: 2.0, d: 2.0, ..Matrix::IDENTITY };
        let shift = Matrix::translate(10.0, 5.0);

        assert_eq!(scale.then(shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn positions_glyphs_from_text_matrix() {
        let resources = helvetica_resources();
        let glyphs = interpret(
            b"BT /F1 10 Tf 72 700 Td (Hi) Tj ET",
            &resources,
            Matrix::IDENTITY,
        );

        assert_eq!(text_of(&glyphs), "Hi");
        let h = &glyphs[0];
        assert_eq!(h.x, 72.0);
        assert_eq!(h.baseline, 700.0);
        assert_eq!(h.font_size, 10.0);
        assert!((h.bbox.y - 698.0).abs() < 1e-3);
        assert!((h.bbox.height - 10.0).abs() < 1e-3);
        assert!((h.bbox.width - 7.22).abs() < 1e-3);

        // 'H' is 722/1000 em wide at 10pt.
        assert!((glyphs[1].x - 79.22).abs() < 1e-3);
        assert!(!glyphs[1].break_before);
    }

    #[test]
    fn tj_adjustments_move_and_break_words() {
        let resources = helvetica_resources();
        let glyphs = interpret(
            b"BT /F1 10 Tf 0 0 Td [(a) -50 (b) -400 (c)] TJ ET",
            &resources,
            Matrix::IDENTITY,
        );

        assert_eq!(text_of(&glyphs), "abc");
        assert!(!glyphs[1].break_before);
        assert!(glyphs[2].break_before);
        assert!((glyphs[1].x - 6.06).abs() < 1e-3);
    }

    #[test]
    fn next_line_operators_use_leading() {
        let resources = helvetica_resources();
        let glyphs = interpret(
            b"BT /F1 12 Tf 14 TL 50 500 Td (a) Tj T* (b) Tj (c) ' ET",
            &resources,
            Matrix::IDENTITY,
        );

        let baselines: Vec<f32> = glyphs.iter().map(|glyph| glyph.baseline).collect();
        assert_eq!(baselines, vec![500.0, 486.0, 472.0]);
        assert!(glyphs.iter().all(|glyph| glyph.x == 50.0));
    }

    #[test]
    fn ctm_and_state_stack_are_honoured() {
        let resources = helvetica_resources();
        let glyphs = interpret(
            b"q 2 0 0 2 100 100 cm BT /F1 10 Tf (a) Tj ET Q BT /F1 10 Tf (b) Tj ET",
            &resources,
            Matrix::IDENTITY,
        );

        assert_eq!(glyphs[0].x, 100.0);
        assert_eq!(glyphs[0].font_size, 20.0);
        assert_eq!(glyphs[1].x, 0.0);
        assert_eq!(glyphs[1].font_size, 10.0);
    }

    #[test]
    fn form_xobjects_are_interpreted_with_their_matrix() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 50.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 30.into(), 40.into()],
            },
            b"BT /F1 10 Tf (x) Tj ET".to_vec(),
        ));
        let page_resources = dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                },
            },
            "XObject" => dictionary! { "Fm0" => form_id },
        };

        let resources = ResourceCollector::new().gather(&doc, Some(&page_resources));
        let glyphs = interpret(b"/Fm0 Do", &resources, Matrix::IDENTITY);

        assert_eq!(text_of(&glyphs), "x");
        assert_eq!((glyphs[0].x, glyphs[0].baseline), (30.0, 40.0));
    }

    #[test]
    fn self_referencing_form_terminates() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Fm0" => form_id },
                },
            },
            b"/Fm0 Do".to_vec(),
        );
        doc.objects.insert(form_id, Object::Stream(form));

        let page_resources = dictionary! { "XObject" => dictionary! { "Fm0" => form_id } };
        let resources = ResourceCollector::new().gather(&doc, Some(&page_resources));

        assert!(interpret(b"/Fm0 Do", &resources, Matrix::IDENTITY).is_empty());
    }

    #[test]
    fn garbage_content_yields_no_glyphs() {
        let glyphs = interpret(b"BT (unterminated", &Resources::default(), Matrix::IDENTITY);
        assert!(glyphs.is_empty());
    }
}

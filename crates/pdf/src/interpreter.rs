//! Content stream interpretation for text.
//!
//! Tracks the graphics and text state of a page's content stream (including
//! form XObjects) and turns every text-showing operator into a styled span
//! positioned in default user space (origin bottom-left, y up).

use crate::font::{PdfFont, FLAG_SUPERSCRIPT};
use crate::objects::{get, get_array, get_dict, object_to_f64, resolve, stream_bytes};
use docmeta_core::color::{int_from_unit_rgb, unit_rgb_from_cmyk};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Spans on baselines closer than this are on the same line.
const BASELINE_TOLERANCE: f64 = 0.5;

/// Gap (relative to the font size) above which merged spans get a space.
const SPACE_GAP: f64 = 0.15;

/// Gap (relative to the font size) above which spans are not merged.
const MAX_MERGE_GAP: f64 = 1.0;

/// A 2D affine transform `[a b c d e f]` as used by `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit y vector.
    fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    fn from_operands(operands: &[f64]) -> Option<Self> {
        match operands {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }
}

/// A styled text span in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub font_name: String,
    pub font_size: f64,
    /// `0xRRGGBB`.
    pub color: u32,
    pub flags: u32,
    pub bold: bool,
    pub italic: bool,
    pub x0: f64,
    pub x1: f64,
    pub baseline: f64,
    /// Top of the glyph box (ascent above the baseline).
    pub top: f64,
    /// Bottom of the glyph box (descent below the baseline).
    pub bottom: f64,
}

impl Span {
    fn can_merge(&self, next: &Span) -> bool {
        let gap = next.x0 - self.x1;
        self.font_name == next.font_name
            && self.flags == next.flags
            && self.color == next.color
            && (self.font_size - next.font_size).abs() < 0.01
            && (self.baseline - next.baseline).abs() < BASELINE_TOLERANCE
            && gap > -SPACE_GAP * self.font_size
            && gap < MAX_MERGE_GAP * self.font_size
    }

    fn merge(&mut self, next: Span) {
        let gap = next.x0 - self.x1;
        if gap > SPACE_GAP * self.font_size
            && !self.text.ends_with(char::is_whitespace)
            && !next.text.starts_with(char::is_whitespace)
        {
            self.text.push(' ');
        }
        self.text.push_str(&next.text);
        self.x1 = self.x1.max(next.x1);
        self.top = self.top.max(next.top);
        self.bottom = self.bottom.min(next.bottom);
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: u32,
    font: Option<Rc<PdfFont>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: 0,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Extracts text spans from content streams of one document.
pub struct TextInterpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Rc<PdfFont>>,
    spans: Vec<Span>,
    forms_in_progress: HashSet<ObjectId>,
}

impl<'a> TextInterpreter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            spans: Vec::new(),
            forms_in_progress: HashSet::new(),
        }
    }

    /// Interpret one page's content and return its spans in drawing order.
    pub fn page_spans(&mut self, content: &[u8], resources: &'a Dictionary) -> Vec<Span> {
        self.spans.clear();
        let mut state = GraphicsState::default();
        self.run(content, resources, &mut state, 0);
        std::mem::take(&mut self.spans)
    }

    fn run(&mut self, content: &[u8], resources: &'a Dictionary, state: &mut GraphicsState, depth: usize) {
        let content = match Content::decode(content) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping undecodable content stream: {}", e);
                return;
            }
        };

        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let nums: Vec<f64> = op
                .operands
                .iter()
                .filter_map(object_to_f64)
                .collect();

            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        *state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        state.ctm = m.multiply(&state.ctm);
                    }
                }

                "g" => {
                    if let [gray] = nums[..] {
                        state.fill = int_from_unit_rgb(gray, gray, gray);
                    }
                }
                "rg" => {
                    if let [r, g, b] = nums[..] {
                        state.fill = int_from_unit_rgb(r, g, b);
                    }
                }
                "k" => {
                    if let [c, m, y, k] = nums[..] {
                        let (r, g, b) = unit_rgb_from_cmyk(c, m, y, k);
                        state.fill = int_from_unit_rgb(r, g, b);
                    }
                }
                "sc" | "scn" => match nums[..] {
                    [gray] => state.fill = int_from_unit_rgb(gray, gray, gray),
                    [r, g, b] => state.fill = int_from_unit_rgb(r, g, b),
                    [c, m, y, k] => {
                        let (r, g, b) = unit_rgb_from_cmyk(c, m, y, k);
                        state.fill = int_from_unit_rgb(r, g, b);
                    }
                    _ => {}
                },
                "cs" => state.fill = 0,

                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => self.set_font(op, resources, state),
                "Tc" => set_first(&nums, &mut state.char_spacing),
                "Tw" => set_first(&nums, &mut state.word_spacing),
                "TL" => set_first(&nums, &mut state.leading),
                "Ts" => set_first(&nums, &mut state.rise),
                "Tz" => {
                    if let Some(v) = nums.first() {
                        state.h_scale = v / 100.0;
                    }
                }
                "Td" => {
                    if let [tx, ty] = nums[..] {
                        tlm = Matrix::translate(tx, ty).multiply(&tlm);
                        tm = tlm;
                    }
                }
                "TD" => {
                    if let [tx, ty] = nums[..] {
                        state.leading = -ty;
                        tlm = Matrix::translate(tx, ty).multiply(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.leading).multiply(&tlm);
                    tm = tlm;
                }

                "Tj" => {
                    if let Some(bytes) = string_operand(op.operands.first()) {
                        self.show(bytes, state, &mut tm);
                    }
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -state.leading).multiply(&tlm);
                    tm = tlm;
                    if let Some(bytes) = string_operand(op.operands.first()) {
                        self.show(bytes, state, &mut tm);
                    }
                }
                "\"" => {
                    if let [aw, ac, ..] = nums[..] {
                        state.word_spacing = aw;
                        state.char_spacing = ac;
                    }
                    tlm = Matrix::translate(0.0, -state.leading).multiply(&tlm);
                    tm = tlm;
                    if let Some(bytes) = string_operand(op.operands.get(2)) {
                        self.show(bytes, state, &mut tm);
                    }
                }
                "TJ" => {
                    let Some(Object::Array(items)) = op.operands.first() else {
                        continue;
                    };
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes, state, &mut tm),
                            other => {
                                if let Some(adjust) = object_to_f64(other) {
                                    let tx = -adjust / 1000.0 * state.font_size * state.h_scale;
                                    tm = Matrix::translate(tx, 0.0).multiply(&tm);
                                }
                            }
                        }
                    }
                }

                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        self.draw_form(op, resources, state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn set_font(&mut self, op: &Operation, resources: &'a Dictionary, state: &mut GraphicsState) {
        let (Some(Object::Name(name)), Some(size)) =
            (op.operands.first(), op.operands.get(1).and_then(object_to_f64))
        else {
            return;
        };
        state.font_size = size;

        let doc = self.doc;
        let entry = get_dict(doc, resources, b"Font").and_then(|fonts| fonts.get(name).ok());
        let font = match entry {
            Some(Object::Reference(id)) => {
                if let Some(font) = self.fonts.get(id) {
                    font.clone()
                } else {
                    let font = match doc.get_dictionary(*id) {
                        Ok(dict) => Rc::new(PdfFont::from_dict(doc, dict)),
                        Err(_) => Rc::new(PdfFont::unknown(&String::from_utf8_lossy(name))),
                    };
                    self.fonts.insert(*id, font.clone());
                    font
                }
            }
            Some(Object::Dictionary(dict)) => Rc::new(PdfFont::from_dict(doc, dict)),
            _ => {
                log::warn!("Font resource /{} not found", String::from_utf8_lossy(name));
                Rc::new(PdfFont::unknown(&String::from_utf8_lossy(name)))
            }
        };
        state.font = Some(font);
    }

    /// Show a string, advancing the text matrix and recording a span.
    fn show(&mut self, bytes: &[u8], state: &GraphicsState, tm: &mut Matrix) {
        let Some(font) = state.font.clone() else {
            log::debug!("Text shown without a font");
            return;
        };
        let glyphs = font.decode(bytes);
        if glyphs.is_empty() {
            return;
        }

        let start = tm.multiply(&state.ctm);
        let mut text = String::new();
        for glyph in &glyphs {
            text.push_str(&glyph.text);
            let spacing = state.char_spacing + if glyph.is_space { state.word_spacing } else { 0.0 };
            let tx = (glyph.width / 1000.0 * state.font_size + spacing) * state.h_scale;
            *tm = Matrix::translate(tx, 0.0).multiply(tm);
        }
        let end = tm.multiply(&state.ctm);

        let (x_start, baseline) = start.apply(0.0, state.rise);
        let (x_end, _) = end.apply(0.0, state.rise);
        let size = state.font_size * start.vertical_scale();
        let mut flags = font.flags;
        if state.rise > 0.0 {
            flags |= FLAG_SUPERSCRIPT;
        }

        if text.is_empty() {
            return;
        }
        self.push_span(Span {
            text,
            font_name: font.name.clone(),
            font_size: size,
            color: state.fill,
            flags,
            bold: font.is_bold(),
            italic: font.is_italic(),
            x0: x_start.min(x_end),
            x1: x_start.max(x_end),
            baseline,
            top: baseline + font.ascent / 1000.0 * size,
            bottom: baseline + font.descent / 1000.0 * size,
        });
    }

    fn push_span(&mut self, span: Span) {
        match self.spans.last_mut() {
            Some(last) if last.can_merge(&span) => last.merge(span),
            _ => self.spans.push(span),
        }
    }

    fn draw_form(&mut self, op: &Operation, resources: &'a Dictionary, state: &GraphicsState, depth: usize) {
        let doc = self.doc;
        let Some(Object::Name(name)) = op.operands.first() else {
            return;
        };
        let Some(Object::Reference(id)) =
            get_dict(doc, resources, b"XObject").and_then(|x| x.get(name).ok())
        else {
            return;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            return;
        };
        if get(doc, &stream.dict, b"Subtype").and_then(|o| o.as_name().ok()) != Some(b"Form".as_slice()) {
            return;
        }
        if !self.forms_in_progress.insert(*id) {
            log::warn!("Skipping recursive form XObject {:?}", id);
            return;
        }

        let form_matrix = get_array(doc, &stream.dict, b"Matrix")
            .and_then(|arr| {
                let nums: Vec<f64> = arr.iter().filter_map(|o| object_to_f64(resolve(doc, o))).collect();
                Matrix::from_operands(&nums)
            })
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = get_dict(doc, &stream.dict, b"Resources").unwrap_or(resources);

        let mut form_state = state.clone();
        form_state.ctm = form_matrix.multiply(&state.ctm);
        let bytes = stream_bytes(stream);
        self.run(&bytes, form_resources, &mut form_state, depth + 1);

        self.forms_in_progress.remove(id);
    }
}

fn set_first(nums: &[f64], target: &mut f64) {
    if let Some(v) = nums.first() {
        *target = *v;
    }
}

fn string_operand(obj: Option<&Object>) -> Option<&[u8]> {
    match obj {
        Some(Object::String(bytes, _)) => Some(bytes),
        _ => None,
    }
}

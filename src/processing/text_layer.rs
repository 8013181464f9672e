//! Content-stream interpreter that turns text-showing operators into
//! positioned glyphs.
//!
//! Only the operators that affect where text lands are tracked: the
//! graphics state stack, the current transformation matrix, the text state
//! and form XObjects. Everything else is ignored.

use crate::models::Rect;
use crate::processing::fonts::PdfFont;
use crate::processing::pdf::{as_number, dict_get, dict_get_dict, resolve};
use crate::utils::CardError;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::rc::Rc;

const MAX_FORM_DEPTH: usize = 8;

/// One shown character, in top-left page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    /// Baseline y, top-left origin.
    pub baseline: f64,
    /// Effective font size on the page.
    pub size: f64,
}

impl Glyph {
    pub fn centre(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

/// Row-vector affine matrix `[a b c d e f]` as used by PDF.
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
        Matrix { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn mul(&self, other: &Matrix) -> Matrix {
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
        (x * self.a + y * self.c + self.e, x * self.b + y * self.d + self.f)
    }

    /// Length of the transformed unit y vector.
    fn vertical_scale(&self) -> f64 {
        self.c.hypot(self.d)
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let n: Vec<f64> = operands.iter().filter_map(as_number).collect();
        match n.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Rc<PdfFont>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Horizontal scaling as a fraction (Tz / 100).
    scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Walks content streams and records every glyph shown.
pub struct TextInterpreter<'a> {
    doc: &'a Document,
    media_box: Rect,
    glyphs: Vec<Glyph>,
    /// Fonts stored as indirect objects, loaded once per document.
    fonts: HashMap<ObjectId, Rc<PdfFont>>,
}

impl<'a> TextInterpreter<'a> {
    pub fn new(doc: &'a Document, media_box: Rect) -> Self {
        TextInterpreter {
            doc,
            media_box,
            glyphs: Vec::new(),
            fonts: HashMap::new(),
        }
    }

    pub fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>) -> Result<(), CardError> {
        let state = GraphicsState {
            ctm: Matrix::IDENTITY,
            text: TextState::default(),
        };
        self.run_stream(content, resources, state, 0)
    }

    pub fn finish(self) -> TextLayer {
        TextLayer {
            glyphs: self.glyphs,
        }
    }

    fn run_stream(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<(), CardError> {
        let content = Content::decode(content)
            .map_err(|e| CardError::DocumentOpenError(format!("Malformed content stream: {}", e)))?;

        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let args = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        gs.ctm = m.mul(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let [name, size] = args.as_slice() {
                        gs.text.size = as_number(size).unwrap_or(0.0);
                        gs.text.font = name
                            .as_name()
                            .ok()
                            .and_then(|name| self.font(resources, name));
                    }
                }
                "Tc" => gs.text.char_spacing = first_number(args).unwrap_or(0.0),
                "Tw" => gs.text.word_spacing = first_number(args).unwrap_or(0.0),
                "Tz" => gs.text.scale = first_number(args).unwrap_or(100.0) / 100.0,
                "TL" => gs.text.leading = first_number(args).unwrap_or(0.0),
                "Ts" => gs.text.rise = first_number(args).unwrap_or(0.0),
                "Td" | "TD" => {
                    let n: Vec<f64> = args.iter().filter_map(as_number).collect();
                    if let [tx, ty] = n.as_slice() {
                        if op.operator == "TD" {
                            gs.text.leading = -ty;
                        }
                        tlm = Matrix::translate(*tx, *ty).mul(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).mul(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = args.first() {
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).mul(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = args.first() {
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "\"" => {
                    if let [aw, ac, Object::String(bytes, _)] = args.as_slice() {
                        gs.text.word_spacing = as_number(aw).unwrap_or(0.0);
                        gs.text.char_spacing = as_number(ac).unwrap_or(0.0);
                        tlm = Matrix::translate(0.0, -gs.text.leading).mul(&tlm);
                        tm = tlm;
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = args.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &gs, &mut tm),
                                other => {
                                    if let Some(n) = as_number(other) {
                                        let tx = -n / 1000.0 * gs.text.size * gs.text.scale;
                                        tm = Matrix::translate(tx, 0.0).mul(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = args.first().and_then(|o| o.as_name().ok()) {
                        self.run_form(name, resources, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), CardError> {
        if depth >= MAX_FORM_DEPTH {
            log::debug!("Form XObject nesting deeper than {}, skipping", MAX_FORM_DEPTH);
            return Ok(());
        }
        let doc = self.doc;
        let Some(xobjects) = resources.and_then(|r| dict_get_dict(doc, r, b"XObject")) else {
            return Ok(());
        };
        let Some(Object::Stream(stream)) = dict_get(doc, xobjects, name) else {
            return Ok(());
        };
        if stream.dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
            return Ok(());
        }

        let content = if stream.dict.get(b"Filter").is_ok() {
            stream.decompressed_content()?
        } else {
            stream.content.clone()
        };
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| Matrix::from_operands(arr))
            .unwrap_or(Matrix::IDENTITY);
        // A form without its own resources draws with its parent's
        let form_resources = dict_get_dict(doc, &stream.dict, b"Resources").or(resources);

        let mut state = gs.clone();
        state.ctm = matrix.mul(&gs.ctm);
        self.run_stream(&content, form_resources, state, depth + 1)
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<Rc<PdfFont>> {
        let doc = self.doc;
        let fonts = dict_get_dict(doc, resources?, b"Font")?;
        let entry = fonts.get(name).ok()?;
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(font) = id.and_then(|id| self.fonts.get(&id)) {
            return Some(Rc::clone(font));
        }
        let dict = resolve(doc, entry).as_dict().ok()?;
        let font = Rc::new(PdfFont::load(doc, dict));
        // direct font dictionaries have no identity to key on
        if let Some(id) = id {
            self.fonts.insert(id, Rc::clone(&font));
        }
        Some(font)
    }

    fn show(&mut self, bytes: &[u8], gs: &GraphicsState, tm: &mut Matrix) {
        let Some(font) = gs.text.font.as_ref() else {
            return;
        };
        let ts = &gs.text;
        let (ascent, descent) = (font.ascent() / 1000.0, font.descent() / 1000.0);

        for ch in font.decode(bytes) {
            let w0 = ch.width / 1000.0;
            let params = Matrix::new(ts.size * ts.scale, 0.0, 0.0, ts.size, 0.0, ts.rise);
            let trm = params.mul(tm).mul(&gs.ctm);

            if !ch.text.is_empty() {
                let corners = [
                    trm.apply(0.0, descent),
                    trm.apply(w0, descent),
                    trm.apply(0.0, ascent),
                    trm.apply(w0, ascent),
                ];
                let (mut x0, mut x1) = (f64::INFINITY, f64::NEG_INFINITY);
                let (mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY);
                for (x, y) in corners {
                    let (x, y) = self.to_page(x, y);
                    x0 = x0.min(x);
                    x1 = x1.max(x);
                    y0 = y0.min(y);
                    y1 = y1.max(y);
                }
                let (_, baseline) = trm.apply(0.0, 0.0);
                let (_, baseline) = self.to_page(0.0, baseline);
                self.glyphs.push(Glyph {
                    text: ch.text,
                    x0,
                    y0,
                    x1,
                    y1,
                    baseline,
                    size: ts.size * tm.mul(&gs.ctm).vertical_scale(),
                });
            }

            // Word spacing applies to the single-byte code 32 only
            let word = if ch.code == 32 && !font.is_two_byte() {
                ts.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * ts.size + ts.char_spacing + word) * ts.scale;
            *tm = Matrix::translate(tx, 0.0).mul(tm);
        }
    }

    fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.media_box.x0, self.media_box.y1 - y)
    }
}

fn first_number(args: &[Object]) -> Option<f64> {
    args.first().and_then(as_number)
}

/// All glyphs of one page, in content-stream order.
#[derive(Debug, Clone, Default)]
pub struct TextLayer {
    glyphs: Vec<Glyph>,
}

impl TextLayer {
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn plain_text(&self) -> String {
        assemble_lines(self.glyphs.iter())
    }

    pub fn text_in_rect(&self, rect: Rect) -> String {
        assemble_lines(self.glyphs.iter().filter(|g| {
            let (cx, cy) = g.centre();
            rect.contains(cx, cy)
        }))
    }
}

/// Group glyphs into lines by baseline and join the lines with `\n`.
fn assemble_lines<'g>(glyphs: impl Iterator<Item = &'g Glyph>) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<&Glyph> = None;

    for glyph in glyphs {
        if let Some(p) = prev {
            let size = p.size.max(glyph.size);
            if (glyph.baseline - p.baseline).abs() > 0.5 * size {
                lines.push(std::mem::take(&mut current));
            } else if glyph.x0 - p.x1 > 0.25 * size && !p.is_whitespace() && !glyph.is_whitespace() {
                current.push(' ');
            }
        }
        current.push_str(&glyph.text);
        prev = Some(glyph);
    }
    lines.push(current);

    lines
        .iter()
        .map(|line| line.trim_end())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

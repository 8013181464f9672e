//! Just enough PDF font handling to turn string bytes into positioned text:
//! code length, advance widths, vertical extent and a ToUnicode mapping.

use crate::processing::pdf::{as_number, dict_get, dict_get_dict, dict_get_name, dict_get_number};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

const DEFAULT_WIDTH: f64 = 500.0;
const DEFAULT_ASCENT: f64 = 800.0;
const DEFAULT_DESCENT: f64 = -200.0;
/// Largest span of codes a single `/W` or bfrange entry may cover.
const MAX_CODE_SPAN: u32 = 0xffff;

/// A decoded character code with its Unicode text and advance width
/// (in 1/1000 of text space units).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    pub text: String,
    pub width: f64,
}

#[derive(Debug, Clone)]
pub struct PdfFont {
    two_byte: bool,
    widths: HashMap<u32, f64>,
    default_width: f64,
    ascent: f64,
    descent: f64,
    to_unicode: Option<HashMap<u32, String>>,
}

impl Default for PdfFont {
    fn default() -> Self {
        PdfFont {
            two_byte: false,
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            to_unicode: None,
        }
    }
}

impl PdfFont {
    pub fn load(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = PdfFont::default();
        let subtype = dict_get_name(doc, dict, b"Subtype").unwrap_or(b"");

        let descriptor_owner = if subtype == b"Type0" {
            font.two_byte = true;
            let descendant = dict_get(doc, dict, b"DescendantFonts")
                .and_then(|obj| obj.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|obj| crate::processing::pdf::resolve(doc, obj).as_dict().ok());
            if let Some(cid_font) = descendant {
                font.default_width = dict_get_number(doc, cid_font, b"DW").unwrap_or(1000.0);
                if let Some(w) = dict_get(doc, cid_font, b"W").and_then(|o| o.as_array().ok()) {
                    font.widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            let first_char = dict_get_number(doc, dict, b"FirstChar").and_then(to_code).unwrap_or(0);
            if let Some(widths) = dict_get(doc, dict, b"Widths").and_then(|o| o.as_array().ok()) {
                for (i, w) in widths.iter().enumerate() {
                    let Some(code) = u32::try_from(i).ok().and_then(|i| first_char.checked_add(i)) else {
                        break;
                    };
                    if let Some(w) = as_number(crate::processing::pdf::resolve(doc, w)) {
                        font.widths.insert(code, w);
                    }
                }
            }
            Some(dict)
        };

        if let Some(descriptor) =
            descriptor_owner.and_then(|owner| dict_get_dict(doc, owner, b"FontDescriptor"))
        {
            if let Some(missing) = dict_get_number(doc, descriptor, b"MissingWidth") {
                if !font.two_byte && missing > 0.0 {
                    font.default_width = missing;
                }
            }
            // Some producers write 0 for both; keep the defaults then
            let ascent = dict_get_number(doc, descriptor, b"Ascent").unwrap_or(0.0);
            let descent = dict_get_number(doc, descriptor, b"Descent").unwrap_or(0.0);
            if ascent > 0.0 {
                font.ascent = ascent;
            }
            if descent < 0.0 {
                font.descent = descent;
            }
        }

        if let Some(Object::Stream(stream)) = dict_get(doc, dict, b"ToUnicode") {
            let data = if stream.dict.get(b"Filter").is_ok() {
                stream.decompressed_content().ok()
            } else {
                Some(stream.content.clone())
            };
            if let Some(data) = data {
                let map = parse_to_unicode(&data);
                if !map.is_empty() {
                    font.to_unicode = Some(map);
                }
            }
        }

        font
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        };

        codes
            .into_iter()
            .map(|code| DecodedChar {
                code,
                text: self.unicode_for(code),
                width: self.widths.get(&code).copied().unwrap_or(self.default_width),
            })
            .collect()
    }

    fn unicode_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(&code)) {
            return text.clone();
        }
        if self.two_byte {
            // Identity-encoded CIDs carry no text without a ToUnicode map
            return String::new();
        }
        match char::from_u32(code) {
            Some(c) if !c.is_control() => c.to_string(),
            _ => String::new(),
        }
    }
}

/// A character code from a PDF number. Values outside the `u32` range give `None`.
fn to_code(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX)).then(|| value as u32)
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(start) = as_number(crate::processing::pdf::resolve(doc, &w[i])).and_then(to_code) else {
            break;
        };
        match w.get(i + 1).map(|o| crate::processing::pdf::resolve(doc, o)) {
            Some(Object::Array(list)) => {
                let codes = (0..=MAX_CODE_SPAN).map_while(|k| start.checked_add(k));
                for (code, v) in codes.zip(list.iter()) {
                    if let Some(v) = as_number(v) {
                        widths.insert(code, v);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let (Some(end), Some(width)) =
                    (as_number(end).and_then(to_code), w.get(i + 2).and_then(as_number))
                else {
                    break;
                };
                for code in start..=end.min(start.saturating_add(MAX_CODE_SPAN)) {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) != Some(&b'<') => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| start + p)
                    .unwrap_or(data.len());
                tokens.push(CMapToken::Hex(decode_hex(&data[start..end])));
                i = end + 1;
            }
            b'<' => {
                tokens.push(CMapToken::Word("<<".to_string()));
                i += 2;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                }
                tokens.push(CMapToken::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}

fn bytes_to_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (u16::from(*hi) << 8) | u16::from(*lo),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Offset the last UTF-16 unit of a bfrange destination.
fn offset_utf16(bytes: &[u8], offset: u32) -> String {
    let mut bytes = bytes.to_vec();
    if bytes.len() >= 2 {
        let n = bytes.len();
        let last = (u32::from(bytes[n - 2]) << 8 | u32::from(bytes[n - 1])) + offset;
        bytes[n - 2] = ((last >> 8) & 0xff) as u8;
        bytes[n - 1] = (last & 0xff) as u8;
    }
    utf16_text(&bytes)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(bytes_to_code(src), utf16_text(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1])
                    else {
                        break;
                    };
                    let (lo, hi) = (bytes_to_code(lo), bytes_to_code(hi));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            for code in lo..=hi.min(lo.saturating_add(MAX_CODE_SPAN)) {
                                map.insert(code, offset_utf16(dst, code - lo));
                            }
                            i += 3;
                        }
                        CMapToken::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = Some(lo);
                            while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                                if let Some(c) = code.filter(|c| *c <= hi) {
                                    map.insert(c, utf16_text(dst));
                                }
                                code = code.and_then(|c| c.checked_add(1));
                                j += 1;
                            }
                            // skip the closing bracket
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

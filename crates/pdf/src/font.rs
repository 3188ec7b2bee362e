//! Font dictionaries: code decoding, glyph widths and style flags.

use crate::cmap::ToUnicode;
use crate::encoding::{glyph_name_to_str, win_ansi_char};
use crate::objects::{get, get_array, get_dict, get_f64, get_name, object_to_f64, resolve, stream_bytes};
use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Subset fonts carry a six-letter tag, e.g. `ABCDEF+Calibri`.
static SUBSET_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{6}\+").unwrap());

/// Style flags recorded on text spans.
pub const FLAG_SUPERSCRIPT: u32 = 1;
pub const FLAG_ITALIC: u32 = 2;
pub const FLAG_SERIF: u32 = 4;
pub const FLAG_MONO: u32 = 8;
pub const FLAG_BOLD: u32 = 16;

// Font descriptor flag bits.
const DESC_FIXED_PITCH: i64 = 1;
const DESC_SERIF: i64 = 1 << 1;
const DESC_ITALIC: i64 = 1 << 6;
const DESC_FORCE_BOLD: i64 = 1 << 18;

const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance width in text space units (thousandths of the font size).
    pub width: f64,
    /// Single-byte code 32, which receives word spacing.
    pub is_space: bool,
}

/// Everything needed to turn shown strings into text and geometry.
#[derive(Debug, Clone)]
pub struct PdfFont {
    pub name: String,
    pub flags: u32,
    /// Ascent and descent in thousandths of the font size.
    pub ascent: f64,
    pub descent: f64,
    composite: bool,
    to_unicode: Option<ToUnicode>,
    differences: HashMap<u32, String>,
    widths: HashMap<u32, f64>,
    default_width: f64,
}

impl PdfFont {
    /// Build from a `/Font` dictionary.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = get_name(doc, dict, b"BaseFont")
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| "Unknown".to_string());
        let name = SUBSET_PREFIX_REGEX.replace(&base_font, "").into_owned();

        let composite = get_name(doc, dict, b"Subtype") == Some(b"Type0".as_slice());
        let descendant = if composite {
            get_array(doc, dict, b"DescendantFonts")
                .and_then(|arr| arr.first())
                .and_then(|o| resolve(doc, o).as_dict().ok())
        } else {
            None
        };

        let descriptor = descendant
            .and_then(|d| get_dict(doc, d, b"FontDescriptor"))
            .or_else(|| get_dict(doc, dict, b"FontDescriptor"));

        let to_unicode = match get(doc, dict, b"ToUnicode") {
            Some(Object::Stream(stream)) => {
                let cmap = ToUnicode::parse(&stream_bytes(stream));
                (!cmap.is_empty()).then_some(cmap)
            }
            _ => None,
        };

        let (widths, default_width) = match descendant {
            Some(d) => cid_widths(doc, d),
            None => simple_widths(doc, dict, descriptor),
        };

        let (ascent, descent) = descriptor
            .map(|d| {
                (
                    get_f64(doc, d, b"Ascent").unwrap_or(800.0),
                    get_f64(doc, d, b"Descent").unwrap_or(-200.0),
                )
            })
            .unwrap_or((800.0, -200.0));

        let descriptor_flags = descriptor
            .and_then(|d| get(doc, d, b"Flags"))
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        Self {
            flags: style_flags(&name, descriptor_flags),
            name,
            ascent: if ascent > 0.0 { ascent } else { 800.0 },
            descent: if descent < 0.0 { descent } else { -200.0 },
            composite,
            to_unicode,
            differences: differences(doc, dict),
            widths,
            default_width,
        }
    }

    /// Fallback for a font resource that cannot be resolved.
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flags: style_flags(name, 0),
            ascent: 800.0,
            descent: -200.0,
            composite: false,
            to_unicode: None,
            differences: HashMap::new(),
            widths: HashMap::new(),
            default_width: DEFAULT_SIMPLE_WIDTH,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.flags & FLAG_BOLD != 0
    }

    pub fn is_italic(&self) -> bool {
        self.flags & FLAG_ITALIC != 0
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let code_len = match &self.to_unicode {
            _ if self.composite => 2,
            Some(cmap) if cmap.code_len() > 1 => cmap.code_len().min(4),
            _ => 1,
        };

        bytes
            .chunks(code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                Glyph {
                    text: self.code_text(code),
                    width: self.widths.get(&code).copied().unwrap_or(self.default_width),
                    is_space: code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    fn code_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.get(code)) {
            return text.to_string();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        if self.composite {
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        u8::try_from(code)
            .ok()
            .and_then(win_ansi_char)
            .map(String::from)
            .unwrap_or_default()
    }
}

/// Derive span flags from the descriptor flags and the font name.
fn style_flags(name: &str, descriptor_flags: i64) -> u32 {
    let lower = name.to_lowercase();
    let mut flags = 0;
    if descriptor_flags & DESC_ITALIC != 0 || lower.contains("italic") || lower.contains("oblique") {
        flags |= FLAG_ITALIC;
    }
    if descriptor_flags & DESC_SERIF != 0
        || lower.contains("times")
        || (lower.contains("serif") && !lower.contains("sans"))
    {
        flags |= FLAG_SERIF;
    }
    if descriptor_flags & DESC_FIXED_PITCH != 0 || lower.contains("courier") || lower.contains("mono") {
        flags |= FLAG_MONO;
    }
    if descriptor_flags & DESC_FORCE_BOLD != 0
        || ["bold", "black", "heavy", "semibold"].iter().any(|w| lower.contains(w))
    {
        flags |= FLAG_BOLD;
    }
    flags
}

fn simple_widths(
    doc: &Document,
    dict: &Dictionary,
    descriptor: Option<&Dictionary>,
) -> (HashMap<u32, f64>, f64) {
    let first_char = get(doc, dict, b"FirstChar")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0)
        .max(0) as u32;

    let widths = get_array(doc, dict, b"Widths")
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, o)| object_to_f64(resolve(doc, o)).map(|w| (first_char + i as u32, w)))
                .collect()
        })
        .unwrap_or_default();

    let missing = descriptor
        .and_then(|d| get_f64(doc, d, b"MissingWidth"))
        .filter(|w| *w > 0.0)
        .unwrap_or(DEFAULT_SIMPLE_WIDTH);

    (widths, missing)
}

/// Parse the `/W` array of a CIDFont: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> (HashMap<u32, f64>, f64) {
    let default_width = get_f64(doc, cid_font, b"DW").unwrap_or(DEFAULT_CID_WIDTH);
    let mut widths = HashMap::new();

    let Some(items) = get_array(doc, cid_font, b"W") else {
        return (widths, default_width);
    };

    let mut i = 0;
    while i < items.len() {
        let Some(first) = object_to_f64(resolve(doc, &items[i])) else {
            break;
        };
        let first = first as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = object_to_f64(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = object_to_f64(last).unwrap_or(first as f64) as u32;
                let w = items.get(i + 2).and_then(|o| object_to_f64(resolve(doc, o)));
                if let Some(w) = w {
                    for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }

    (widths, default_width)
}

/// Code overrides from `/Encoding /Differences`.
fn differences(doc: &Document, dict: &Dictionary) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let Some(encoding) = get_dict(doc, dict, b"Encoding") else {
        return map;
    };
    let Some(items) = get_array(doc, encoding, b"Differences") else {
        return map;
    };

    let mut code = 0u32;
    for item in items {
        match resolve(doc, item) {
            Object::Integer(n) => code = (*n).max(0) as u32,
            Object::Name(name) => {
                if let Some(text) = glyph_name_to_str(&String::from_utf8_lossy(name)) {
                    map.insert(code, text);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_simple_font_widths_and_flags() {
        let mut doc = Document::with_version("1.5");
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Flags" => 2 | 64,
            "Ascent" => 700,
            "Descent" => -300,
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Georgia-Bold",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 650.into()],
            "FontDescriptor" => descriptor,
        };

        let font = PdfFont::from_dict(&doc, &font);
        assert_eq!(font.name, "Georgia-Bold");
        assert_eq!(font.flags, FLAG_ITALIC | FLAG_SERIF | FLAG_BOLD);
        assert!(font.is_bold() && font.is_italic());
        assert_eq!(font.ascent, 700.0);

        let glyphs = font.decode(b"AB C");
        let texts: Vec<&str> = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", " ", "C"]);
        assert_eq!(glyphs[0].width, 600.0);
        assert_eq!(glyphs[1].width, 650.0);
        assert_eq!(glyphs[3].width, DEFAULT_SIMPLE_WIDTH);
        assert!(glyphs[2].is_space);
    }

    #[test]
    fn test_composite_font_with_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"beginbfchar\n<0001> <0048>\n<0002> <0069>\nendbfchar".to_vec(),
        )));
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 900,
            "W" => vec![1.into(), vec![Object::Integer(720)].into(), 2.into(), 3.into(), 250.into()],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Courier",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::from(cid_font)],
            "ToUnicode" => cmap,
        };

        let font = PdfFont::from_dict(&doc, &font);
        assert_eq!(font.flags, FLAG_MONO);
        let glyphs = font.decode(&[0, 1, 0, 2, 0, 9]);
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "H");
        assert_eq!(glyphs[0].width, 720.0);
        assert_eq!(glyphs[1].text, "i");
        assert_eq!(glyphs[1].width, 250.0);
        assert_eq!(glyphs[2].width, 900.0);
    }

    #[test]
    fn test_differences_override_win_ansi() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![65.into(), Object::Name(b"bullet".to_vec())],
            },
        };
        let font = PdfFont::from_dict(&doc, &font);
        let text: String = font.decode(b"AB").into_iter().map(|g| g.text).collect();
        assert_eq!(text, "\u{2022}B");
        assert_eq!(font.flags, 0);
    }
}

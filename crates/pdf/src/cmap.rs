//! ToUnicode CMap parsing.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static BFCHAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap());

static BFRANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").unwrap()
});

static HEX_STRING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap());

/// Ranges wider than this are truncated; real CMaps never need more.
const MAX_RANGE: u32 = 0xFFFF;

/// A character code to Unicode mapping.
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
    /// Bytes per character code, from the source code widths.
    code_len: usize,
}

impl ToUnicode {
    /// Parse the (decompressed) contents of a ToUnicode stream.
    pub fn parse(data: &[u8]) -> Self {
        let content = String::from_utf8_lossy(data);
        let mut cmap = ToUnicode::default();

        for section in sections(&content, "beginbfchar", "endbfchar") {
            for caps in BFCHAR_REGEX.captures_iter(section) {
                let Ok(src) = u32::from_str_radix(&caps[1], 16) else {
                    continue;
                };
                cmap.note_code_len(&caps[1]);
                cmap.map.insert(src, decode_utf16_hex(&caps[2]));
            }
        }

        for section in sections(&content, "beginbfrange", "endbfrange") {
            for caps in BFRANGE_REGEX.captures_iter(section) {
                let (Ok(lo), Ok(hi)) = (
                    u32::from_str_radix(&caps[1], 16),
                    u32::from_str_radix(&caps[2], 16),
                ) else {
                    continue;
                };
                if hi < lo {
                    continue;
                }
                cmap.note_code_len(&caps[1]);
                let hi = hi.min(lo.saturating_add(MAX_RANGE));
                let dst = &caps[3];

                if dst.starts_with('[') {
                    for (offset, item) in HEX_STRING_REGEX.captures_iter(dst).enumerate() {
                        let code = lo + offset as u32;
                        if code > hi {
                            break;
                        }
                        cmap.map.insert(code, decode_utf16_hex(&item[1]));
                    }
                } else {
                    let base = decode_utf16_units(dst.trim_matches(['<', '>']));
                    for code in lo..=hi {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add((code - lo) as u16);
                        }
                        cmap.map.insert(code, String::from_utf16_lossy(&units));
                    }
                }
            }
        }

        log::debug!("Parsed ToUnicode CMap with {} entries", cmap.map.len());
        cmap
    }

    fn note_code_len(&mut self, hex: &str) {
        self.code_len = self.code_len.max(hex.len().div_ceil(2));
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(begin) {
        let after = &rest[start + begin.len()..];
        match after.find(end) {
            Some(stop) => {
                out.push(&after[..stop]);
                rest = &after[stop + end.len()..];
            }
            None => break,
        }
    }
    out
}

/// Destination strings are UTF-16BE; one-byte destinations are code points.
fn decode_utf16_units(hex: &str) -> Vec<u16> {
    if hex.len() <= 2 {
        return u16::from_str_radix(hex, 16).map(|v| vec![v]).unwrap_or_default();
    }
    hex.as_bytes()
        .chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|h| u16::from_str_radix(h, 16).ok())
        .collect()
}

fn decode_utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&decode_utf16_units(hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0024> <0041>
endbfchar
2 beginbfrange
<0044> <0046> <0061>
<0050> <0051> [<0078> <D835DF0C>]
endbfrange
endcmap";

    #[test]
    fn test_bfchar_and_bfrange() {
        let cmap = ToUnicode::parse(SAMPLE);
        assert_eq!(cmap.code_len(), 2);
        assert_eq!(cmap.get(0x03), Some(" "));
        assert_eq!(cmap.get(0x24), Some("A"));
        assert_eq!(cmap.get(0x44), Some("a"));
        assert_eq!(cmap.get(0x46), Some("c"));
        assert_eq!(cmap.get(0x47), None);
        assert_eq!(cmap.get(0x50), Some("x"));
        assert_eq!(cmap.get(0x51), Some("\u{1D70C}"));
    }

    #[test]
    fn test_ligature_and_single_byte_codes() {
        let cmap = ToUnicode::parse(b"beginbfchar\n<1F> <00660069>\nendbfchar");
        assert_eq!(cmap.code_len(), 1);
        assert_eq!(cmap.get(0x1F), Some("fi"));
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(ToUnicode::parse(b"not a cmap").is_empty());
    }
}

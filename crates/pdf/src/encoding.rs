//! WinAnsi (Windows-1252) text encoding and glyph names.

/// Code points for bytes 0x80..=0x9F. Zero marks an unassigned slot.
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Decode one WinAnsi byte.
pub fn win_ansi_char(byte: u8) -> Option<char> {
    match byte {
        0x80..=0x9F => match WIN_ANSI_HIGH[(byte - 0x80) as usize] {
            0 => None,
            cp => char::from_u32(cp as u32),
        },
        _ => Some(byte as char),
    }
}

/// Encode a character as WinAnsi, `None` when it has no code.
pub fn win_ansi_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    match cp {
        0x00..=0x7F | 0xA0..=0xFF => Some(cp as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&v| v != 0 && v as u32 == cp)
            .map(|i| 0x80 + i as u8),
    }
}

/// Encode text for a WinAnsi font. Unencodable characters become `?` and
/// control characters become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if c.is_control() {
                b' '
            } else {
                win_ansi_byte(c).unwrap_or(b'?')
            }
        })
        .collect()
}

/// Map an Adobe glyph name from a `/Differences` array to text.
pub fn glyph_name_to_str(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 {
            let decoded: Option<String> = hex
                .as_bytes()
                .chunks(4)
                .map(|chunk| {
                    std::str::from_utf8(chunk)
                        .ok()
                        .and_then(|h| u32::from_str_radix(h, 16).ok())
                        .and_then(char::from_u32)
                })
                .collect();
            return decoded;
        }
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_string());
        }
    }

    let c = match name {
        "space" | "nbspace" => ' ',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" | "minus" => '-',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "exclam" => '!',
        "question" => '?',
        "quotesingle" => '\'',
        "quotedbl" => '"',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "parenleft" => '(',
        "parenright" => ')',
        "bracketleft" => '[',
        "bracketright" => ']',
        "braceleft" => '{',
        "braceright" => '}',
        "slash" => '/',
        "backslash" => '\\',
        "ampersand" => '&',
        "at" => '@',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "asterisk" => '*',
        "plus" => '+',
        "equal" => '=',
        "less" => '<',
        "greater" => '>',
        "underscore" => '_',
        "bullet" => '\u{2022}',
        "ellipsis" => '\u{2026}',
        "Euro" => '\u{20AC}',
        "copyright" => '\u{00A9}',
        "registered" => '\u{00AE}',
        "trademark" => '\u{2122}',
        "degree" => '\u{00B0}',
        _ => return None,
    };
    Some(c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_roundtrip_specials() {
        assert_eq!(win_ansi_char(0x80), Some('€'));
        assert_eq!(win_ansi_char(0x81), None);
        assert_eq!(win_ansi_char(b'A'), Some('A'));
        assert_eq!(win_ansi_char(0xE9), Some('é'));
        assert_eq!(win_ansi_byte('€'), Some(0x80));
        assert_eq!(win_ansi_byte('é'), Some(0xE9));
        assert_eq!(win_ansi_byte('中'), None);
    }

    #[test]
    fn test_encode_replaces_unencodable() {
        assert_eq!(encode_win_ansi("a\tb中"), b"a b?".to_vec());
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_str("A").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_str("space").as_deref(), Some(" "));
        assert_eq!(glyph_name_to_str("uni0041").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_str("uni00410042").as_deref(), Some("AB"));
        assert_eq!(glyph_name_to_str("g123"), None);
    }
}

//! Conversions between the colour encodings used by the sidecars.
//!
//! PDF spans carry a packed `0xRRGGBB` integer, DOCX/PPTX runs carry
//! `[r, g, b]` triples, and the tree uses hex strings.

/// Split a packed `0xRRGGBB` value into its components.
pub fn rgb_from_int(color: u32) -> [u8; 3] {
    [
        ((color >> 16) & 0xff) as u8,
        ((color >> 8) & 0xff) as u8,
        (color & 0xff) as u8,
    ]
}

/// Pack `[r, g, b]` into `0xRRGGBB`.
pub fn int_from_rgb(rgb: [u8; 3]) -> u32 {
    ((rgb[0] as u32) << 16) | ((rgb[1] as u32) << 8) | rgb[2] as u32
}

/// Format a packed colour as `#rrggbb`.
pub fn hex_from_int(color: u32) -> String {
    let [r, g, b] = rgb_from_int(color);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Format `[r, g, b]` as uppercase `RRGGBB`, the form OOXML uses.
pub fn ooxml_hex(rgb: [u8; 3]) -> String {
    format!("{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Parse `RRGGBB` or `#RRGGBB`. Anything else (including `auto`) is `None`.
pub fn rgb_from_hex(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Convert a fill colour in `0.0..=1.0` components to `0xRRGGBB`.
pub fn int_from_unit_rgb(r: f64, g: f64, b: f64) -> u32 {
    let to_byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    int_from_rgb([to_byte(r), to_byte(g), to_byte(b)])
}

/// Naive CMYK to RGB conversion in unit components.
pub fn unit_rgb_from_cmyk(c: f64, m: f64, y: f64, k: f64) -> (f64, f64, f64) {
    (
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_rgb_conversions() {
        assert_eq!(rgb_from_int(0xFF8000), [255, 128, 0]);
        assert_eq!(int_from_rgb([255, 128, 0]), 0xFF8000);
        assert_eq!(hex_from_int(0x00ff10), "#00ff10");
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(rgb_from_hex("FF0000"), Some([255, 0, 0]));
        assert_eq!(rgb_from_hex("#00ff00"), Some([0, 255, 0]));
        assert_eq!(rgb_from_hex("auto"), None);
        assert_eq!(rgb_from_hex("12345"), None);
    }

    #[test]
    fn test_ooxml_hex_is_uppercase() {
        assert_eq!(ooxml_hex([0xab, 0x01, 0xff]), "AB01FF");
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(int_from_unit_rgb(1.0, 0.0, 0.0), 0xFF0000);
        assert_eq!(int_from_unit_rgb(2.0, -1.0, 0.5), 0xFF0080);
        let (r, g, b) = unit_rgb_from_cmyk(0.0, 0.0, 0.0, 1.0);
        assert_eq!((r, g, b), (0.0, 0.0, 0.0));
    }
}

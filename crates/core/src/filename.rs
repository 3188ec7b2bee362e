//! File name sanitizing and media type helpers.

use regex::Regex;
use std::sync::LazyLock;

/// Characters outside this set are dropped from uploaded file names.
static UNSAFE_CHARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Reduce an untrusted file name to a safe, flat ASCII name.
///
/// Directory components are discarded, whitespace becomes `_`, and leading
/// dots/underscores are trimmed so the result can never be `..` or hidden.
/// May return an empty string, which callers must reject.
pub fn secure_filename(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let spaced = WHITESPACE_REGEX.replace_all(base.trim(), "_");
    let cleaned = UNSAFE_CHARS_REGEX.replace_all(&spaced, "");

    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// The extension implied by a MIME type, e.g. `image/png` → `png`.
pub fn ext_from_content_type(content_type: &str) -> String {
    content_type
        .rsplit('/')
        .next()
        .unwrap_or(content_type)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// The MIME type for an image extension.
pub fn content_type_from_ext(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// File stem of an archive path, e.g. `media/image1.png` → `image1`.
pub fn part_stem(part_name: &str) -> &str {
    let base = part_name.rsplit('/').next().unwrap_or(part_name);
    base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
}

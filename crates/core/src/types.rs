//! Sidecar types written to and read from `metadata.json`.
//!
//! Field names are the on-disk JSON contract shared by the extractors and
//! the recreators, so renaming a field is a breaking change.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A4 page width in points, used when a sidecar carries no page size.
pub const DEFAULT_PAGE_WIDTH: f64 = 595.0;

/// A4 page height in points, used when a sidecar carries no page size.
pub const DEFAULT_PAGE_HEIGHT: f64 = 842.0;

/// The format of a source or output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Word document (Office Open XML).
    Docx,
    /// PowerPoint presentation (Office Open XML).
    Pptx,
}

impl DocumentFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    ///
    /// DOCX and PPTX share the ZIP signature, so only PDF can be told apart
    /// from the header alone.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }
        None
    }

    /// Detect format from the file header, falling back to the extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mut magic = [0u8; 8];
        let from_magic = std::fs::File::open(path).ok().and_then(|mut f| {
            use std::io::Read;
            let n = f.read(&mut magic).ok()?;
            Self::from_magic(&magic[..n])
        });

        from_magic.or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension)
        })
    }

    /// The canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Pptx => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| crate::Error::UnsupportedFormat(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

/// Sidecar for an extracted PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub pages: Vec<PdfPage>,
}

/// One PDF page with its styled text spans and images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    /// 1-based page number.
    pub page_num: usize,

    #[serde(default = "default_page_width")]
    pub width: f64,

    #[serde(default = "default_page_height")]
    pub height: f64,

    pub text_instances: Vec<TextInstance>,

    pub images: Vec<PdfImage>,
}

impl PdfPage {
    /// Create an empty A4 page with the given 1-based number.
    pub fn new(page_num: usize) -> Self {
        Self {
            page_num,
            width: DEFAULT_PAGE_WIDTH,
            height: DEFAULT_PAGE_HEIGHT,
            text_instances: Vec::new(),
            images: Vec::new(),
        }
    }
}

fn default_page_width() -> f64 {
    DEFAULT_PAGE_WIDTH
}

fn default_page_height() -> f64 {
    DEFAULT_PAGE_HEIGHT
}

/// A run of text drawn with a single font, size and colour.
///
/// Coordinates use a top-left origin with y growing downwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInstance {
    pub text: String,

    pub font_size: f64,

    /// Fill colour packed as `0xRRGGBB`.
    pub font_color: u32,

    pub font_name: String,

    /// `[x0, y0, x1, y1]`.
    pub bbox: [f64; 4],

    /// Baseline start point `[x, y]`.
    #[serde(default)]
    pub origin: Option<[f64; 2]>,

    /// Style flags: superscript 1, italic 2, serif 4, monospaced 8, bold 16.
    #[serde(default)]
    pub flags: u32,

    #[serde(default)]
    pub bold: bool,

    #[serde(default)]
    pub italic: bool,
}

/// An image saved next to a PDF sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfImage {
    /// 0-based position of the image on its page.
    pub index: usize,
    pub path: String,
    pub ext: String,
}

// ---------------------------------------------------------------------------
// DOCX
// ---------------------------------------------------------------------------

/// Sidecar for an extracted Word document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocxMetadata {
    pub paragraphs: Vec<Paragraph>,
    pub images: Vec<DocxImage>,
    pub tables: Vec<Table>,
}

/// A paragraph and its formatted runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 1-based position among body paragraphs. Absent for table cells and shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub para_num: Option<usize>,

    /// Concatenated text of all runs.
    pub text: String,

    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Build a paragraph from its runs, deriving the full text.
    pub fn from_runs(para_num: Option<usize>, runs: Vec<Run>) -> Self {
        let text = runs.iter().map(|r| r.text.as_str()).collect();
        Self {
            para_num,
            text,
            runs,
        }
    }
}

/// A run of text sharing one set of character properties.
///
/// `None` means the property is inherited from the style hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,

    #[serde(default)]
    pub bold: Option<bool>,

    #[serde(default)]
    pub italic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,

    #[serde(default)]
    pub font_name: Option<String>,

    /// Size in points.
    #[serde(default)]
    pub font_size: Option<f64>,

    /// `[r, g, b]`.
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

impl Run {
    /// Create an unformatted run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// An image saved next to a DOCX sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocxImage {
    pub path: String,
    pub ext: String,
}

/// A table with its rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// 1-based table number.
    pub table_num: usize,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Number of columns, taken from the first row.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.cells.len()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// 1-based row number.
    pub row_num: usize,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

// ---------------------------------------------------------------------------
// PPTX
// ---------------------------------------------------------------------------

/// Sidecar for an extracted presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PptxMetadata {
    pub slides: Vec<Slide>,
}

impl PptxMetadata {
    /// All run texts across every slide, in reading order.
    pub fn all_run_texts(&self) -> Vec<&str> {
        self.slides
            .iter()
            .flat_map(|s| s.shapes.iter())
            .flat_map(|sh| sh.paragraphs.iter())
            .flat_map(|p| p.runs.iter().map(|r| r.text.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub slide_num: usize,
    pub shapes: Vec<Shape>,
    pub images: Vec<SlideImage>,
}

/// A text-bearing shape on a slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    /// Horizontal offset in EMU.
    pub x: i64,
    /// Vertical offset in EMU.
    pub y: i64,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideImage {
    pub index: usize,
    pub path: String,
    pub ext: String,
}

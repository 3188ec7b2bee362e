//! DOCX package writer.
//!
//! Builds a minimal but complete WordprocessingML package: content types,
//! package and document relationships, a small style sheet, the document
//! body and any embedded media.

use docmeta_core::color::ooxml_hex;
use docmeta_core::filename::content_type_from_ext;
use docmeta_core::{Error, Result, Run};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// English Metric Units per point.
pub const EMU_PER_PT: f64 = 12_700.0;

/// Widest picture placed without an explicit width: the 6.5in text column.
const MAX_NATIVE_WIDTH_PT: f64 = 468.0;

/// Text column width in twentieths of a point (Letter with 1in margins).
const TEXT_WIDTH_TWIPS: u32 = 9_360;

/// Handle to a paragraph added with [`DocxBuilder::add_paragraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParagraphId(usize);

/// Paragraphs of a table cell, each a list of runs.
pub type CellContent = Vec<Vec<Run>>;

#[derive(Debug, Clone)]
enum BodyItem {
    Paragraph(Vec<Run>),
    Picture(Picture),
    Table { columns: usize, rows: Vec<Vec<CellContent>> },
}

#[derive(Debug, Clone)]
struct Picture {
    rel_id: String,
    media_name: String,
    cx: i64,
    cy: i64,
}

#[derive(Debug, Clone)]
struct MediaPart {
    rel_id: String,
    name: String,
    data: Vec<u8>,
}

/// Incrementally builds a Word document.
#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    body: Vec<BodyItem>,
    media: Vec<MediaPart>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty paragraph and return a handle for adding runs to it.
    pub fn add_paragraph(&mut self) -> ParagraphId {
        self.body.push(BodyItem::Paragraph(Vec::new()));
        ParagraphId(self.body.len() - 1)
    }

    /// Append a run to a paragraph.
    pub fn add_run(&mut self, paragraph: ParagraphId, run: Run) {
        if let Some(BodyItem::Paragraph(runs)) = self.body.get_mut(paragraph.0) {
            runs.push(run);
        }
    }

    /// Runs currently in a paragraph.
    pub fn runs(&self, paragraph: ParagraphId) -> &[Run] {
        match self.body.get(paragraph.0) {
            Some(BodyItem::Paragraph(runs)) => runs,
            _ => &[],
        }
    }

    /// Append a paragraph holding the given runs.
    pub fn add_paragraph_with_runs(&mut self, runs: Vec<Run>) -> ParagraphId {
        self.body.push(BodyItem::Paragraph(runs));
        ParagraphId(self.body.len() - 1)
    }

    /// Append an inline picture in its own paragraph.
    ///
    /// With `width_pt` the height follows the aspect ratio; without it the
    /// image is placed at 72 dpi, capped to the text column width.
    pub fn add_picture(&mut self, data: Vec<u8>, width_pt: Option<f64>) -> Result<()> {
        let format = image::guess_format(&data)
            .map_err(|e| Error::ImageError(format!("Unrecognized picture data: {}", e)))?;
        let decoded = image::load_from_memory_with_format(&data, format)
            .map_err(|e| Error::ImageError(format!("Failed to decode picture: {}", e)))?;
        let (px_w, px_h) = (decoded.width().max(1) as f64, decoded.height().max(1) as f64);

        let width = width_pt.unwrap_or_else(|| px_w.min(MAX_NATIVE_WIDTH_PT));
        let height = width * px_h / px_w;

        let ext = format.extensions_str().first().copied().unwrap_or("png");
        let index = self.media.len() + 1;
        let rel_id = format!("rIdImg{}", index);
        let name = format!("image{}.{}", index, ext);

        self.media.push(MediaPart {
            rel_id: rel_id.clone(),
            name: name.clone(),
            data,
        });
        self.body.push(BodyItem::Picture(Picture {
            rel_id,
            media_name: name,
            cx: (width * EMU_PER_PT).round() as i64,
            cy: (height * EMU_PER_PT).round() as i64,
        }));
        Ok(())
    }

    /// Append a table. Rows shorter than `columns` are padded, longer rows truncated.
    pub fn add_table(&mut self, columns: usize, rows: Vec<Vec<CellContent>>) {
        self.body.push(BodyItem::Table { columns, rows });
    }

    pub fn paragraph_count(&self) -> usize {
        self.body
            .iter()
            .filter(|b| matches!(b, BodyItem::Paragraph(_)))
            .count()
    }

    pub fn picture_count(&self) -> usize {
        self.media.len()
    }

    /// Serialize the package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, Vec<u8>); 5] = [
            ("[Content_Types].xml", self.content_types_xml()?),
            ("_rels/.rels", package_rels_xml()?),
            ("word/_rels/document.xml.rels", self.document_rels_xml()?),
            ("word/styles.xml", styles_xml()?),
            ("word/document.xml", self.document_xml()?),
        ];

        for (name, data) in parts.iter() {
            write_zip_entry(&mut zip, name, data, options)?;
        }
        for media in &self.media {
            let name = format!("word/media/{}", media.name);
            write_zip_entry(&mut zip, &name, &media.data, options)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        Ok(cursor.into_inner())
    }

    /// Serialize the package to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        log::debug!("Saved DOCX to {}", path.display());
        Ok(())
    }

    fn content_types_xml(&self) -> Result<Vec<u8>> {
        let mut xml = XmlOut::new()?;
        xml.start("Types", &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")])?;
        xml.empty(
            "Default",
            &[
                ("Extension", "rels"),
                ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
            ],
        )?;
        xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;

        let exts: BTreeSet<&str> = self
            .media
            .iter()
            .filter_map(|m| m.name.rsplit_once('.').map(|(_, e)| e))
            .collect();
        for ext in exts {
            xml.empty("Default", &[("Extension", ext), ("ContentType", content_type_from_ext(ext))])?;
        }

        xml.empty(
            "Override",
            &[
                ("PartName", "/word/document.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
                ),
            ],
        )?;
        xml.empty(
            "Override",
            &[
                ("PartName", "/word/styles.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
                ),
            ],
        )?;
        xml.end("Types")?;
        Ok(xml.finish())
    }

    fn document_rels_xml(&self) -> Result<Vec<u8>> {
        let mut xml = XmlOut::new()?;
        xml.start("Relationships", &[("xmlns", "http://schemas.openxmlformats.org/package/2006/relationships")])?;
        let styles_type = format!("{}/styles", REL_BASE);
        xml.empty(
            "Relationship",
            &[("Id", "rIdStyles"), ("Type", &styles_type), ("Target", "styles.xml")],
        )?;
        let image_type = format!("{}/image", REL_BASE);
        for media in &self.media {
            let target = format!("media/{}", media.name);
            xml.empty(
                "Relationship",
                &[("Id", &media.rel_id), ("Type", &image_type), ("Target", &target)],
            )?;
        }
        xml.end("Relationships")?;
        Ok(xml.finish())
    }

    fn document_xml(&self) -> Result<Vec<u8>> {
        let mut xml = XmlOut::new()?;
        xml.start(
            "w:document",
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        )?;
        xml.start("w:body", &[])?;

        let mut drawing_id = 0usize;
        for item in &self.body {
            match item {
                BodyItem::Paragraph(runs) => write_paragraph(&mut xml, runs)?,
                BodyItem::Picture(picture) => {
                    drawing_id += 1;
                    write_picture(&mut xml, picture, drawing_id)?;
                }
                BodyItem::Table { columns, rows } => write_table(&mut xml, *columns, rows)?,
            }
        }

        xml.start("w:sectPr", &[])?;
        xml.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", "1440"),
                ("w:right", "1440"),
                ("w:bottom", "1440"),
                ("w:left", "1440"),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        )?;
        xml.end("w:sectPr")?;

        xml.end("w:body")?;
        xml.end("w:document")?;
        Ok(xml.finish())
    }
}

fn write_zip_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    data: &[u8],
    options: FileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
    zip.write_all(data)?;
    Ok(())
}

fn write_paragraph(xml: &mut XmlOut, runs: &[Run]) -> Result<()> {
    if runs.is_empty() {
        return xml.empty("w:p", &[]);
    }
    xml.start("w:p", &[])?;
    for run in runs {
        write_run(xml, run)?;
    }
    xml.end("w:p")
}

fn write_run(xml: &mut XmlOut, run: &Run) -> Result<()> {
    xml.start("w:r", &[])?;

    let has_props = run.bold.is_some()
        || run.italic.is_some()
        || run.underline.is_some()
        || run.font_name.is_some()
        || run.font_size.is_some()
        || run.color.is_some();

    if has_props {
        xml.start("w:rPr", &[])?;
        if let Some(font) = run.font_name.as_deref() {
            xml.empty("w:rFonts", &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)])?;
        }
        if let Some(bold) = run.bold {
            write_toggle(xml, "w:b", bold)?;
        }
        if let Some(italic) = run.italic {
            write_toggle(xml, "w:i", italic)?;
        }
        if let Some(rgb) = run.color {
            xml.empty("w:color", &[("w:val", &ooxml_hex(rgb))])?;
        }
        if let Some(size) = run.font_size {
            let half_points = ((size * 2.0).round() as i64).max(1).to_string();
            xml.empty("w:sz", &[("w:val", &half_points)])?;
            xml.empty("w:szCs", &[("w:val", &half_points)])?;
        }
        if let Some(underline) = run.underline {
            xml.empty("w:u", &[("w:val", if underline { "single" } else { "none" })])?;
        }
        xml.end("w:rPr")?;
    }

    // Tabs and line breaks are elements in WordprocessingML, not characters.
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            xml.empty("w:br", &[])?;
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                xml.empty("w:tab", &[])?;
            }
            if !segment.is_empty() {
                xml.start("w:t", &[("xml:space", "preserve")])?;
                xml.text(segment)?;
                xml.end("w:t")?;
            }
        }
    }

    xml.end("w:r")
}

fn write_toggle(xml: &mut XmlOut, name: &str, on: bool) -> Result<()> {
    if on {
        xml.empty(name, &[])
    } else {
        xml.empty(name, &[("w:val", "0")])
    }
}

fn write_picture(xml: &mut XmlOut, picture: &Picture, id: usize) -> Result<()> {
    let cx = picture.cx.to_string();
    let cy = picture.cy.to_string();
    let id = id.to_string();
    let name = format!("Picture {}", id);

    xml.start("w:p", &[])?;
    xml.start("w:r", &[])?;
    xml.start("w:drawing", &[])?;
    xml.start("wp:inline", &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")])?;
    xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
    xml.empty("wp:docPr", &[("id", &id), ("name", &name)])?;
    xml.start("wp:cNvGraphicFramePr", &[])?;
    xml.empty("a:graphicFrameLocks", &[("noChangeAspect", "1")])?;
    xml.end("wp:cNvGraphicFramePr")?;
    xml.start("a:graphic", &[])?;
    xml.start("a:graphicData", &[("uri", NS_PIC)])?;
    xml.start("pic:pic", &[])?;
    xml.start("pic:nvPicPr", &[])?;
    xml.empty("pic:cNvPr", &[("id", "0"), ("name", &picture.media_name)])?;
    xml.empty("pic:cNvPicPr", &[])?;
    xml.end("pic:nvPicPr")?;
    xml.start("pic:blipFill", &[])?;
    xml.empty("a:blip", &[("r:embed", &picture.rel_id)])?;
    xml.start("a:stretch", &[])?;
    xml.empty("a:fillRect", &[])?;
    xml.end("a:stretch")?;
    xml.end("pic:blipFill")?;
    xml.start("pic:spPr", &[])?;
    xml.start("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
    xml.end("a:xfrm")?;
    xml.start("a:prstGeom", &[("prst", "rect")])?;
    xml.empty("a:avLst", &[])?;
    xml.end("a:prstGeom")?;
    xml.end("pic:spPr")?;
    xml.end("pic:pic")?;
    xml.end("a:graphicData")?;
    xml.end("a:graphic")?;
    xml.end("wp:inline")?;
    xml.end("w:drawing")?;
    xml.end("w:r")?;
    xml.end("w:p")
}

fn write_table(xml: &mut XmlOut, columns: usize, rows: &[Vec<CellContent>]) -> Result<()> {
    if columns == 0 {
        log::debug!("Skipping table without columns");
        return Ok(());
    }
    let col_width = (TEXT_WIDTH_TWIPS / columns as u32).to_string();

    xml.start("w:tbl", &[])?;
    xml.start("w:tblPr", &[])?;
    xml.empty("w:tblStyle", &[("w:val", "TableGrid")])?;
    xml.empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")])?;
    xml.end("w:tblPr")?;

    xml.start("w:tblGrid", &[])?;
    for _ in 0..columns {
        xml.empty("w:gridCol", &[("w:w", &col_width)])?;
    }
    xml.end("w:tblGrid")?;

    let empty_cell: CellContent = Vec::new();
    for row in rows {
        xml.start("w:tr", &[])?;
        for col in 0..columns {
            let cell = row.get(col).unwrap_or(&empty_cell);
            xml.start("w:tc", &[])?;
            xml.start("w:tcPr", &[])?;
            xml.empty("w:tcW", &[("w:w", &col_width), ("w:type", "dxa")])?;
            xml.end("w:tcPr")?;
            // A cell must end with a paragraph.
            if cell.is_empty() {
                xml.empty("w:p", &[])?;
            }
            for runs in cell {
                write_paragraph(xml, runs)?;
            }
            xml.end("w:tc")?;
        }
        xml.end("w:tr")?;
    }

    xml.end("w:tbl")
}

fn package_rels_xml() -> Result<Vec<u8>> {
    let mut xml = XmlOut::new()?;
    xml.start("Relationships", &[("xmlns", "http://schemas.openxmlformats.org/package/2006/relationships")])?;
    let doc_type = format!("{}/officeDocument", REL_BASE);
    xml.empty(
        "Relationship",
        &[("Id", "rId1"), ("Type", &doc_type), ("Target", "word/document.xml")],
    )?;
    xml.end("Relationships")?;
    Ok(xml.finish())
}

fn styles_xml() -> Result<Vec<u8>> {
    let mut xml = XmlOut::new()?;
    xml.start("w:styles", &[("xmlns:w", NS_W)])?;

    xml.start("w:style", &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")])?;
    xml.empty("w:name", &[("w:val", "Normal")])?;
    xml.empty("w:qFormat", &[])?;
    xml.end("w:style")?;

    xml.start("w:style", &[("w:type", "table"), ("w:styleId", "TableGrid")])?;
    xml.empty("w:name", &[("w:val", "Table Grid")])?;
    xml.start("w:tblPr", &[])?;
    xml.start("w:tblBorders", &[])?;
    for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
        xml.empty(
            side,
            &[("w:val", "single"), ("w:sz", "4"), ("w:space", "0"), ("w:color", "auto")],
        )?;
    }
    xml.end("w:tblBorders")?;
    xml.end("w:tblPr")?;
    xml.end("w:style")?;

    xml.end("w:styles")?;
    Ok(xml.finish())
}

/// Thin wrapper over `quick_xml::Writer` mapping errors into ours.
struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(el)).map_err(xml_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(el)).map_err(xml_err)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

fn xml_err(e: quick_xml::Error) -> Error {
    Error::XmlError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DocxParser;
    use crate::test_support::tiny_png;
    use docmeta_core::opc;
    use zip::ZipArchive;

    fn styled(text: &str) -> Run {
        Run {
            text: text.to_string(),
            bold: Some(true),
            italic: Some(false),
            underline: Some(true),
            font_name: Some("Calibri".to_string()),
            font_size: Some(11.5),
            color: Some([0x12, 0x34, 0x56]),
        }
    }

    #[test]
    fn test_written_package_parses_back() {
        let mut builder = DocxBuilder::new();
        let p = builder.add_paragraph();
        builder.add_run(p, styled("Hello"));
        builder.add_run(p, Run::new(" tab\there\nnext"));
        builder.add_paragraph();
        builder.add_table(
            2,
            vec![vec![vec![vec![Run::new("A1")]], vec![vec![Run::new("B1")]]], vec![vec![vec![Run::new("A2")]]]],
        );

        let bytes = builder.to_bytes().unwrap();
        let doc = DocxParser::new().parse(Cursor::new(bytes)).unwrap();

        assert_eq!(doc.paragraphs.len(), 2);
        let run = &doc.paragraphs[0].runs[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(run.bold, Some(true));
        assert_eq!(run.italic, Some(false));
        assert_eq!(run.underline, Some(true));
        assert_eq!(run.font_name.as_deref(), Some("Calibri"));
        assert_eq!(run.font_size, Some(11.5));
        assert_eq!(run.color, Some([0x12, 0x34, 0x56]));
        assert_eq!(doc.paragraphs[0].runs[1].text, " tab\there\nnext");

        let table = &doc.tables[0];
        assert_eq!(table.rows.len(), 2);
        // Short rows are padded to the column count.
        assert_eq!(table.rows[1].cells.len(), 2);
        assert_eq!(table.rows[1].cells[0].paragraphs[0].text, "A2");
        assert!(table.rows[1].cells[1].paragraphs[0].runs.is_empty());
    }

    #[test]
    fn test_picture_is_embedded_with_width() {
        let mut builder = DocxBuilder::new();
        builder.add_picture(tiny_png(), Some(300.0)).unwrap();
        assert_eq!(builder.picture_count(), 1);

        let bytes = builder.to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        let body = opc::read_part_string(&mut archive, "word/document.xml").unwrap();
        // 300pt wide, 2:1 aspect ratio.
        assert!(body.contains(r#"cx="3810000" cy="1905000""#));
        assert!(body.contains(r#"r:embed="rIdImg1""#));

        let types = opc::read_part_string(&mut archive, "[Content_Types].xml").unwrap();
        assert!(types.contains(r#"Extension="png""#));

        let doc = DocxParser::new().parse(Cursor::new(bytes)).unwrap();
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].part_name, "word/media/image1.png");
    }

    #[test]
    fn test_rejects_non_image_picture() {
        let mut builder = DocxBuilder::new();
        assert!(builder.add_picture(b"not an image".to_vec(), None).is_err());
    }

    #[test]
    fn test_native_picture_width_is_capped() {
        let big = image::RgbImage::new(1000, 500);
        let mut png = Cursor::new(Vec::new());
        big.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let mut builder = DocxBuilder::new();
        builder.add_picture(png.into_inner(), None).unwrap();
        let bytes = builder.to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let body = opc::read_part_string(&mut archive, "word/document.xml").unwrap();
        let cx = (MAX_NATIVE_WIDTH_PT * EMU_PER_PT) as i64;
        assert!(body.contains(&format!(r#"cx="{}""#, cx)));
    }
}

//! DOCX file parser implementation.

use docmeta_core::color::rgb_from_hex;
use docmeta_core::filename::ext_from_content_type;
use docmeta_core::opc::{self, local_name, ContentTypes};
use docmeta_core::{Error, Paragraph, Result, Run, Table, TableCell, TableRow};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Fallback location of the main document part.
const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// Relationship type of the main document part.
const REL_OFFICE_DOCUMENT: &str = "/officeDocument";

/// A parsed Word document.
#[derive(Debug, Clone, Default)]
pub struct DocxDocument {
    /// Body paragraphs (outside tables), in document order.
    pub paragraphs: Vec<Paragraph>,

    /// Top-level tables.
    pub tables: Vec<Table>,

    /// Images referenced from the main document part.
    pub images: Vec<EmbeddedImage>,
}

/// An image part embedded in an OOXML package.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Relationship id (`rId7`).
    pub rel_id: String,

    /// Part name inside the archive (`word/media/image1.png`).
    pub part_name: String,

    /// Extension derived from the part's content type.
    pub ext: String,

    pub data: Vec<u8>,
}

/// Parser for DOCX (WordprocessingML) files.
pub struct DocxParser;

impl DocxParser {
    /// Create a new DOCX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a DOCX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<DocxDocument> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let document_part = self.find_document_part(&mut archive)?;
        log::debug!("Main document part: {}", document_part);

        let xml = opc::read_part_string(&mut archive, &document_part)?;
        let (paragraphs, tables) = parse_body(&xml)?;

        let images = self.read_images(&mut archive, &document_part)?;

        Ok(DocxDocument {
            paragraphs,
            tables,
            images,
        })
    }

    /// Locate the main document part through the package relationships.
    fn find_document_part<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let rels = opc::load_relationships(archive, "")?;
        let from_rels = rels
            .iter()
            .find(|r| r.rel_type.ends_with(REL_OFFICE_DOCUMENT))
            .map(|r| opc::resolve_target("", &r.target));

        let part = from_rels.unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());
        if !opc::has_part(archive, &part) {
            return Err(Error::DocxParseError(format!(
                "main document part '{}' not found",
                part
            )));
        }
        Ok(part)
    }

    /// Read every image related to the main document part, in relationship order.
    fn read_images<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        document_part: &str,
    ) -> Result<Vec<EmbeddedImage>> {
        let content_types = ContentTypes::load(archive)?;
        let rels = opc::load_relationships(archive, document_part)?;

        let mut images = Vec::new();
        for rel in rels.iter().filter(|r| r.is_image()) {
            let part_name = opc::resolve_target(document_part, &rel.target);
            let data = match opc::read_part_bytes(archive, &part_name) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Skipping image {}: {}", rel.id, e);
                    continue;
                }
            };

            let ext = content_types
                .content_type_for(&part_name)
                .map(ext_from_content_type)
                .or_else(|| part_name.rsplit_once('.').map(|(_, e)| e.to_lowercase()))
                .unwrap_or_else(|| "bin".to_string());

            images.push(EmbeddedImage {
                rel_id: rel.id.clone(),
                part_name,
                ext,
                data,
            });
        }

        Ok(images)
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpret an OOXML on/off property such as `<w:b/>` or `<w:b w:val="0"/>`.
fn on_off(e: &BytesStart) -> bool {
    match opc::attr_value(e, b"val") {
        Some(v) => !matches!(v.as_str(), "0" | "false" | "off" | "none"),
        None => true,
    }
}

/// Walks `word/document.xml` collecting body paragraphs and tables.
#[derive(Default)]
struct BodyCollector {
    paragraphs: Vec<Paragraph>,
    tables: Vec<Table>,

    tbl_depth: usize,
    p_depth: usize,

    table: Option<Table>,
    row: Option<TableRow>,
    cell: Option<TableCell>,
    runs: Vec<Run>,
    run: Option<Run>,
    in_rpr: bool,
    in_text: bool,
}

impl BodyCollector {
    fn start(&mut self, e: &BytesStart) {
        let name = e.name();
        match local_name(name.as_ref()) {
            b"tbl" => {
                self.tbl_depth += 1;
                if self.tbl_depth == 1 {
                    self.table = Some(Table {
                        table_num: self.tables.len() + 1,
                        rows: Vec::new(),
                    });
                }
            }
            b"tr" if self.tbl_depth == 1 => {
                let row_num = self.table.as_ref().map(|t| t.rows.len()).unwrap_or(0) + 1;
                self.row = Some(TableRow {
                    row_num,
                    cells: Vec::new(),
                });
            }
            b"tc" if self.tbl_depth == 1 => {
                self.cell = Some(TableCell::default());
            }
            b"p" => {
                self.p_depth += 1;
                if self.p_depth == 1 {
                    self.runs.clear();
                }
            }
            b"r" if self.p_depth == 1 => {
                self.run = Some(Run::default());
            }
            b"rPr" if self.run.is_some() && self.p_depth == 1 => {
                self.in_rpr = true;
            }
            b"t" if self.run.is_some() && self.p_depth == 1 && !self.in_rpr => {
                self.in_text = true;
            }
            b"tab" if self.p_depth == 1 && !self.in_rpr => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push('\t');
                }
            }
            b"br" | b"cr" if self.p_depth == 1 && !self.in_rpr => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push('\n');
                }
            }
            prop if self.in_rpr => {
                if let Some(run) = self.run.as_mut() {
                    apply_run_property(run, prop, e);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_text = false,
            b"rPr" if self.p_depth == 1 => self.in_rpr = false,
            b"r" if self.p_depth == 1 => {
                if let Some(run) = self.run.take() {
                    self.runs.push(run);
                }
            }
            b"p" => {
                if self.p_depth == 1 {
                    self.finish_paragraph();
                }
                self.p_depth = self.p_depth.saturating_sub(1);
            }
            b"tc" if self.tbl_depth == 1 => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.cells.push(cell);
                }
            }
            b"tr" if self.tbl_depth == 1 => {
                if let (Some(row), Some(table)) = (self.row.take(), self.table.as_mut()) {
                    table.rows.push(row);
                }
            }
            b"tbl" => {
                if self.tbl_depth == 1 {
                    if let Some(table) = self.table.take() {
                        self.tables.push(table);
                    }
                }
                self.tbl_depth = self.tbl_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            if let Some(run) = self.run.as_mut() {
                run.text.push_str(text);
            }
        }
    }

    fn finish_paragraph(&mut self) {
        let runs = std::mem::take(&mut self.runs);
        match self.tbl_depth {
            0 => {
                let para_num = self.paragraphs.len() + 1;
                self.paragraphs.push(Paragraph::from_runs(Some(para_num), runs));
            }
            1 => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.paragraphs.push(Paragraph::from_runs(None, runs));
                }
            }
            // Paragraphs of nested tables are not part of the outer cell.
            _ => {}
        }
    }
}

fn apply_run_property(run: &mut Run, prop: &[u8], e: &BytesStart) {
    match prop {
        b"b" => run.bold = Some(on_off(e)),
        b"i" => run.italic = Some(on_off(e)),
        b"u" => run.underline = Some(on_off(e)),
        b"rFonts" => {
            run.font_name = opc::attr_value(e, b"ascii").or_else(|| opc::attr_value(e, b"hAnsi"));
        }
        b"sz" => {
            run.font_size = opc::attr_value(e, b"val")
                .and_then(|v| v.parse::<f64>().ok())
                .map(|half_points| half_points / 2.0);
        }
        b"color" => {
            run.color = opc::attr_value(e, b"val").and_then(|v| rgb_from_hex(&v));
        }
        _ => {}
    }
}

/// Parse the body of `word/document.xml` into paragraphs and tables.
pub(crate) fn parse_body(xml: &str) -> Result<(Vec<Paragraph>, Vec<Table>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut body = BodyCollector::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => body.start(e),
            Ok(Event::Empty(ref e)) => {
                body.start(e);
                let name = e.name();
                body.end(local_name(name.as_ref()));
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                body.end(local_name(name.as_ref()));
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                body.text(&text);
            }
            Ok(Event::CData(ref e)) => {
                body.text(&String::from_utf8_lossy(e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing document body at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok((body.paragraphs, body.tables))
}

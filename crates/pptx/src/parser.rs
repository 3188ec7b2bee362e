//! PPTX file parser implementation.

use docmeta_core::color::rgb_from_hex;
use docmeta_core::filename::ext_from_content_type;
use docmeta_core::opc::{self, local_name, ContentTypes};
use docmeta_core::{Error, Paragraph, Result, Run, Shape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{NsReader, Reader};
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

pub(crate) const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Relationship type suffix of slide parts (excludes layouts and masters).
const REL_SLIDE: &str = "/slide";

/// A parsed presentation.
#[derive(Debug, Clone, Default)]
pub struct PptxDocument {
    pub filename: String,
    pub slides: Vec<ParsedSlide>,
}

/// One slide: its text shapes and the pictures it shows.
#[derive(Debug, Clone, Default)]
pub struct ParsedSlide {
    /// 1-based position in the presentation.
    pub slide_num: usize,
    /// Part name, e.g. `ppt/slides/slide1.xml`.
    pub part_name: String,
    pub shapes: Vec<Shape>,
    pub images: Vec<SlideMedia>,
}

/// An image part referenced by a picture on a slide.
#[derive(Debug, Clone)]
pub struct SlideMedia {
    pub part_name: String,
    pub ext: String,
    pub data: Vec<u8>,
}

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<PptxDocument> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        let content_types = ContentTypes::load(&mut archive)?;

        let mut document = PptxDocument {
            filename: filename.to_string(),
            slides: Vec::new(),
        };

        for (idx, part_name) in self.slide_parts(&mut archive)?.into_iter().enumerate() {
            let slide = self.parse_slide(&mut archive, &content_types, part_name, idx + 1)?;
            document.slides.push(slide);
        }

        Ok(document)
    }

    /// Slide part names in presentation order.
    ///
    /// The order comes from `p:sldIdLst` in `ppt/presentation.xml`; slides
    /// it does not list are appended ordered by the number in their name.
    pub(crate) fn slide_parts<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        if !opc::has_part(archive, PRESENTATION_PART) {
            return Err(Error::PptxParseError(format!(
                "'{}' not found",
                PRESENTATION_PART
            )));
        }

        let rels = opc::load_relationships(archive, PRESENTATION_PART)?;
        let mut by_id: HashMap<String, String> = rels
            .iter()
            .filter(|r| r.rel_type.ends_with(REL_SLIDE) && !r.external)
            .map(|r| (r.id.clone(), opc::resolve_target(PRESENTATION_PART, &r.target)))
            .collect();

        let xml = opc::read_part_string(archive, PRESENTATION_PART)?;
        let mut ordered = Vec::with_capacity(by_id.len());
        for rel_id in slide_id_order(&xml)? {
            if let Some(part) = by_id.remove(&rel_id) {
                ordered.push(part);
            }
        }

        let mut rest: Vec<String> = by_id.into_values().collect();
        rest.sort_by(|a, b| match (extract_slide_number(a), extract_slide_number(b)) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        });
        ordered.extend(rest);

        Ok(ordered)
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        content_types: &ContentTypes,
        part_name: String,
        slide_num: usize,
    ) -> Result<ParsedSlide> {
        let xml = opc::read_part_string(archive, &part_name)?;
        let collected = collect_slide(&xml)?;

        let rels = opc::load_relationships(archive, &part_name)?;
        let mut images = Vec::new();
        for embed in &collected.blips {
            let Some(rel) = rels.iter().find(|r| &r.id == embed && r.is_image()) else {
                log::warn!("Slide {}: picture {} has no image relationship", slide_num, embed);
                continue;
            };
            let media = opc::resolve_target(&part_name, &rel.target);
            let data = match opc::read_part_bytes(archive, &media) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Skipping image {}: {}", media, e);
                    continue;
                }
            };
            let ext = content_types
                .content_type_for(&media)
                .map(ext_from_content_type)
                .or_else(|| media.rsplit_once('.').map(|(_, e)| e.to_lowercase()))
                .unwrap_or_else(|| "bin".to_string());
            images.push(SlideMedia {
                part_name: media,
                ext,
                data,
            });
        }

        Ok(ParsedSlide {
            slide_num,
            part_name,
            shapes: collected.shapes,
            images,
        })
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Relationship ids of `p:sldIdLst`, in order.
fn slide_id_order(xml: &str) -> Result<Vec<String>> {
    let mut reader = NsReader::from_str(xml);
    reader.trim_text(true);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"sldId" => {
                if let Some(id) = opc::attr_value_ns(&reader, e, opc::NS_RELATIONSHIPS, b"id") {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing presentation: {}", e)));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Text shapes and picture references found in one slide.
#[derive(Default)]
struct SlideCollector {
    /// Local names of the open elements.
    stack: Vec<Vec<u8>>,
    shapes: Vec<Shape>,
    /// `r:embed` ids of picture blips, in document order.
    blips: Vec<String>,

    shape: Option<Shape>,
    has_offset: bool,
    has_text_body: bool,
    paragraph: Option<Vec<Run>>,
    run: Option<Run>,
}

impl SlideCollector {
    fn parent_is(&self, name: &[u8]) -> bool {
        self.stack.last().is_some_and(|n| n.as_slice() == name)
    }

    fn grandparent_is(&self, name: &[u8]) -> bool {
        self.stack.len() >= 2 && self.stack[self.stack.len() - 2].as_slice() == name
    }

    fn start(&mut self, e: &BytesStart) {
        let name = e.name();
        let local = local_name(name.as_ref());
        match local {
            b"sp" => {
                self.shape = Some(Shape::default());
                self.has_offset = false;
                self.has_text_body = false;
            }
            b"cNvPr" if self.parent_is(b"nvSpPr") => {
                if let Some(shape) = self.shape.as_mut() {
                    shape.name = opc::attr_value(e, b"name").unwrap_or_default();
                }
            }
            b"off" if !self.has_offset && self.parent_is(b"xfrm") => {
                if let Some(shape) = self.shape.as_mut() {
                    let coord = |key: &[u8]| opc::attr_value(e, key).and_then(|v| v.parse::<i64>().ok());
                    shape.x = coord(b"x").unwrap_or(0);
                    shape.y = coord(b"y").unwrap_or(0);
                    self.has_offset = true;
                }
            }
            b"txBody" if self.shape.is_some() => self.has_text_body = true,
            b"p" if self.parent_is(b"txBody") && self.shape.is_some() => {
                self.paragraph = Some(Vec::new());
            }
            b"r" if self.parent_is(b"p") && self.paragraph.is_some() => {
                self.run = Some(Run::default());
            }
            b"rPr" if self.parent_is(b"r") => {
                if let Some(run) = self.run.as_mut() {
                    apply_run_attributes(run, e);
                }
            }
            b"latin" if self.parent_is(b"rPr") => {
                if let Some(run) = self.run.as_mut() {
                    run.font_name = opc::attr_value(e, b"typeface");
                }
            }
            b"srgbClr" if self.parent_is(b"solidFill") && self.grandparent_is(b"rPr") => {
                if let Some(run) = self.run.as_mut() {
                    run.color = opc::attr_value(e, b"val").and_then(|v| rgb_from_hex(&v));
                }
            }
            b"blip" => {
                if let Some(embed) = opc::attr_value(e, b"embed") {
                    self.blips.push(embed);
                }
            }
            _ => {}
        }
        self.stack.push(local.to_vec());
    }

    fn end(&mut self) {
        let Some(local) = self.stack.pop() else {
            return;
        };
        match local.as_slice() {
            b"r" => {
                if let (Some(run), Some(runs)) = (self.run.take(), self.paragraph.as_mut()) {
                    runs.push(run);
                }
            }
            b"p" => {
                if let (Some(runs), Some(shape)) = (self.paragraph.take(), self.shape.as_mut()) {
                    let para_num = shape.paragraphs.len() + 1;
                    shape.paragraphs.push(Paragraph::from_runs(Some(para_num), runs));
                }
            }
            b"sp" => {
                if let Some(shape) = self.shape.take() {
                    if self.has_text_body {
                        self.shapes.push(shape);
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.parent_is(b"t") {
            if let Some(run) = self.run.as_mut() {
                run.text.push_str(text);
            }
        }
    }
}

/// `b`, `i`, `u` and `sz` attributes of `a:rPr`.
fn apply_run_attributes(run: &mut Run, e: &BytesStart) {
    let flag = |v: String| !matches!(v.as_str(), "0" | "false");
    run.bold = opc::attr_value(e, b"b").map(flag);
    run.italic = opc::attr_value(e, b"i").map(flag);
    run.underline = opc::attr_value(e, b"u").map(|v| v != "none");
    run.font_size = opc::attr_value(e, b"sz")
        .and_then(|v| v.parse::<f64>().ok())
        .map(|hundredths| hundredths / 100.0);
}

fn collect_slide(xml: &str) -> Result<SlideCollector> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut slide = SlideCollector::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => slide.start(e),
            Ok(Event::Empty(ref e)) => {
                slide.start(e);
                slide.end();
            }
            Ok(Event::End(_)) => slide.end(),
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                slide.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing slide at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slide)
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_pptx, slide_xml};
    use std::io::Cursor;

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("ppt/slides/slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_shape_runs_and_properties() {
        let xml = slide_xml(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/></p:nvSpPr><p:spPr><a:xfrm><a:off x="457200" y="274638"/><a:ext cx="100" cy="100"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en-US" b="1" sz="2400"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill><a:latin typeface="Arial"/></a:rPr><a:t>Hello</a:t></a:r><a:r><a:rPr i="0" u="sng"/><a:t> &amp; world</a:t></a:r></a:p><a:p><a:endParaRPr/></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="3" name="Rect"/></p:nvSpPr><p:spPr/></p:sp>"#,
        );
        let slide = collect_slide(&xml).unwrap();
        assert_eq!(slide.shapes.len(), 1);

        let shape = &slide.shapes[0];
        assert_eq!(shape.name, "Title 1");
        assert_eq!((shape.x, shape.y), (457200, 274638));
        assert_eq!(shape.paragraphs.len(), 2);
        assert_eq!(shape.paragraphs[0].text, "Hello & world");
        assert!(shape.paragraphs[1].runs.is_empty());

        let r0 = &shape.paragraphs[0].runs[0];
        assert_eq!(r0.bold, Some(true));
        assert_eq!(r0.font_size, Some(24.0));
        assert_eq!(r0.color, Some([255, 0, 0]));
        assert_eq!(r0.font_name.as_deref(), Some("Arial"));

        let r1 = &shape.paragraphs[0].runs[1];
        assert_eq!(r1.italic, Some(false));
        assert_eq!(r1.underline, Some(true));
        assert_eq!(r1.bold, None);
    }

    #[test]
    fn test_parse_presentation_order_and_images() {
        let doc = PptxParser::new()
            .parse(Cursor::new(sample_pptx()), "deck.pptx")
            .unwrap();
        assert_eq!(doc.filename, "deck.pptx");
        assert_eq!(doc.slides.len(), 2);

        // sldIdLst lists slide2.xml first.
        assert_eq!(doc.slides[0].part_name, "ppt/slides/slide2.xml");
        assert_eq!(doc.slides[0].slide_num, 1);
        assert_eq!(doc.slides[0].shapes[0].paragraphs[0].text, "First slide");

        let second = &doc.slides[1];
        assert_eq!(second.shapes[0].paragraphs[0].text, "Hello world");
        assert_eq!(second.images.len(), 1);
        assert_eq!(second.images[0].part_name, "ppt/media/image1.png");
        assert_eq!(second.images[0].ext, "png");
    }

    #[test]
    fn test_slide_order_with_any_relationship_prefix() {
        let xml = r#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst><p:sldId id="256" rel:id="rId5"/><p:sldId id="257" rel:id="rId2"/></p:sldIdLst></p:presentation>"#;
        assert_eq!(slide_id_order(xml).unwrap(), vec!["rId5", "rId2"]);

        let unbound = r#"<p:presentation xmlns:p="p" xmlns:r="urn:other"><p:sldIdLst><p:sldId id="256" r:id="rId5"/></p:sldIdLst></p:presentation>"#;
        assert!(slide_id_order(unbound).unwrap().is_empty());
    }

    #[test]
    fn test_missing_presentation_part() {
        let bytes = crate::test_support::build_package(&[("docProps/app.xml", b"<x/>")]);
        let err = PptxParser::new().parse(Cursor::new(bytes), "x.pptx").unwrap_err();
        assert!(matches!(err, Error::PptxParseError(_)));
    }
}

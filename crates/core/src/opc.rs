//! Open Packaging Conventions helpers shared by the DOCX and PPTX backends.
//!
//! Both formats are ZIP archives of XML parts linked by `.rels` files; this
//! module reads parts, relationships and content types.

use crate::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::{NsReader, Reader};
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Namespace of `r:id`, `r:embed` and other relationship references.
pub const NS_RELATIONSHIPS: &[u8] = b"http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// DrawingML main namespace (`a:`).
pub const NS_DRAWINGML: &[u8] = b"http://schemas.openxmlformats.org/drawingml/2006/main";

/// Relationship type suffix for images.
pub const REL_IMAGE: &str = "/image";

/// A single `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target as written in the `.rels` file.
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship points at an embedded image part.
    pub fn is_image(&self) -> bool {
        !self.external && self.rel_type.contains("image")
    }
}

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Value of the attribute whose local name is `key`, ignoring namespace prefixes.
pub fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

/// Value of the attribute `local` bound to namespace `ns`, whatever prefix the part uses.
pub fn attr_value_ns<R>(reader: &NsReader<R>, e: &BytesStart, ns: &[u8], local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| {
            matches!(
                reader.resolve_attribute(a.key),
                (ResolveResult::Bound(Namespace(bound)), name) if bound == ns && name.as_ref() == local
            )
        })
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Whether the element `name` is `local` in namespace `ns`.
pub fn element_is<R>(reader: &NsReader<R>, name: QName, ns: &[u8], local: &[u8]) -> bool {
    matches!(
        reader.resolve_element(name),
        (ResolveResult::Bound(Namespace(bound)), name) if bound == ns && name.as_ref() == local
    )
}

/// Read a text part from the archive.
pub fn read_part_string<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Read a binary part from the archive.
pub fn read_part_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Whether the archive contains a part.
pub fn has_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> bool {
    archive.by_name(path).is_ok()
}

/// Path of the relationships part for `part`, e.g.
/// `word/document.xml` → `word/_rels/document.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target relative to the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Parse a `.rels` part.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let id = attr_value(e, b"Id").unwrap_or_default();
                let rel_type = attr_value(e, b"Type").unwrap_or_default();
                let target = attr_value(e, b"Target").unwrap_or_default();
                let external = attr_value(e, b"TargetMode")
                    .map(|m| m.eq_ignore_ascii_case("external"))
                    .unwrap_or(false);
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Load the relationships of `part`. A missing `.rels` part yields no relationships.
pub fn load_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Vec<Relationship>> {
    let path = rels_path_for(part);
    if !has_part(archive, &path) {
        return Ok(Vec::new());
    }
    parse_relationships(&read_part_string(archive, &path)?)
}

/// The `[Content_Types].xml` table.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut types = Self::default();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match local_name(e.name().as_ref()) {
                        b"Default" => {
                            if let (Some(ext), Some(ct)) =
                                (attr_value(e, b"Extension"), attr_value(e, b"ContentType"))
                            {
                                types.defaults.insert(ext.to_lowercase(), ct);
                            }
                        }
                        b"Override" => {
                            if let (Some(part), Some(ct)) =
                                (attr_value(e, b"PartName"), attr_value(e, b"ContentType"))
                            {
                                types
                                    .overrides
                                    .insert(part.trim_start_matches('/').to_string(), ct);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing content types: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    /// Load `[Content_Types].xml`, tolerating its absence.
    pub fn load<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Self> {
        if !has_part(archive, "[Content_Types].xml") {
            log::warn!("Package has no [Content_Types].xml");
            return Ok(Self::default());
        }
        Self::parse(&read_part_string(archive, "[Content_Types].xml")?)
    }

    /// Content type of a part: override first, then the extension default.
    pub fn content_type_for(&self, part: &str) -> Option<&str> {
        let part = part.trim_start_matches('/');
        if let Some(ct) = self.overrides.get(part) {
            return Some(ct);
        }
        let ext = part.rsplit_once('.')?.1.to_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_lookups_ignore_prefix() {
        let xml = r#"<x:sldId xmlns:x="p" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships" id="256" rel:id="rId7"/>"#;
        let mut reader = NsReader::from_str(xml);
        match reader.read_event().unwrap() {
            Event::Empty(e) => {
                assert_eq!(attr_value_ns(&reader, &e, NS_RELATIONSHIPS, b"id").as_deref(), Some("rId7"));
                assert!(attr_value_ns(&reader, &e, NS_DRAWINGML, b"id").is_none());
                assert!(element_is(&reader, e.name(), b"p", b"sldId"));
                assert!(!element_is(&reader, e.name(), NS_DRAWINGML, b"sldId"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image2.jpeg"),
            "ppt/media/image2.jpeg"
        );
        assert_eq!(resolve_target("word/document.xml", "/word/media/x.png"), "word/media/x.png");
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="http://example.com/a.png" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 3);
        assert!(!rels[0].is_image());
        assert!(rels[1].is_image());
        assert!(!rels[2].is_image());
        assert_eq!(rels[1].target, "media/image1.png");
    }

    #[test]
    fn test_content_types() {
        let xml = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="png" ContentType="image/png"/>
  <Default Extension="JPEG" ContentType="image/jpeg"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;
        let types = ContentTypes::parse(xml).unwrap();
        assert_eq!(types.content_type_for("word/media/image1.png"), Some("image/png"));
        assert_eq!(types.content_type_for("/word/media/photo.jpeg"), Some("image/jpeg"));
        assert!(types
            .content_type_for("word/document.xml")
            .unwrap()
            .ends_with("document.main+xml"));
        assert_eq!(types.content_type_for("word/media/x.gif"), None);
    }
}

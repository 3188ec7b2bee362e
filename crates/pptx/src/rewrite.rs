//! Reading and rewriting the text runs of slide text bodies.
//!
//! Runs are addressed by slide number and their position among all DrawingML
//! `a:r` elements inside `p:txBody` elements of that slide. Other elements
//! named `r`, such as OMML math runs, are not counted. The indices from
//! [`collect_runs`] line up with the edits passed to [`rewrite_runs`].

use crate::parser::PptxParser;
use docmeta_core::opc::{self, local_name};
use docmeta_core::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{NsReader, Writer};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// The run texts of one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRuns {
    /// 1-based position in the presentation.
    pub slide_num: usize,
    pub part_name: String,
    pub runs: Vec<String>,
}

/// Address of a run within a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunLocation {
    pub slide_num: usize,
    pub run_index: usize,
}

/// Text to add below a run, keyed by the run it follows.
pub type RunEdits = HashMap<RunLocation, String>;

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::ZipError(e.to_string())
}

fn xml_err(e: quick_xml::Error) -> Error {
    Error::XmlError(e.to_string())
}

/// Text of every run in every slide text body, slides in presentation order.
pub fn collect_runs<R: Read + Seek>(reader: R) -> Result<Vec<SlideRuns>> {
    let mut archive = ZipArchive::new(reader).map_err(zip_err)?;
    let parts = PptxParser::new().slide_parts(&mut archive)?;

    let mut slides = Vec::with_capacity(parts.len());
    for (idx, part_name) in parts.into_iter().enumerate() {
        let xml = opc::read_part_string(&mut archive, &part_name)?;
        slides.push(SlideRuns {
            slide_num: idx + 1,
            runs: run_texts(&xml)?,
            part_name,
        });
    }
    Ok(slides)
}

/// Copy the package from `reader` to `writer`, adding a line under edited runs.
///
/// For each run with an edit, an `<a:br/>` and a new run are inserted right
/// after it. The new run carries a copy of the original run properties and
/// the edit text. Slides without edits and every non-slide part are copied
/// byte-for-byte.
pub fn rewrite_runs<R: Read + Seek, W: Write + Seek>(reader: R, writer: W, edits: &RunEdits) -> Result<W> {
    let mut archive = ZipArchive::new(reader).map_err(zip_err)?;
    let parts = PptxParser::new().slide_parts(&mut archive)?;

    let mut rewritten: HashMap<String, Vec<u8>> = HashMap::new();
    for (idx, part_name) in parts.into_iter().enumerate() {
        let slide_num = idx + 1;
        if !edits.keys().any(|loc| loc.slide_num == slide_num) {
            continue;
        }
        let xml = opc::read_part_string(&mut archive, &part_name)?;
        rewritten.insert(part_name, rewrite_slide(&xml, slide_num, edits)?);
    }
    log::debug!("Rewriting {} slide parts", rewritten.len());

    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(zip_err)?;
        match rewritten.remove(file.name()) {
            Some(data) => {
                let name = file.name().to_string();
                drop(file);
                zip.start_file(name, options).map_err(zip_err)?;
                zip.write_all(&data)?;
            }
            None => zip.raw_copy_file(file).map_err(zip_err)?,
        }
    }

    zip.finish().map_err(zip_err)
}

/// Local name of a start, empty or end tag; empty for other events.
fn local_of<'a>(event: &'a Event<'_>) -> &'a [u8] {
    match event {
        Event::Start(e) | Event::Empty(e) => local_name(e.name().into_inner()),
        Event::End(e) => local_name(e.name().into_inner()),
        _ => b"",
    }
}

/// Whether `event` opens, closes or is a DrawingML text run.
fn is_text_run(reader: &NsReader<&[u8]>, event: &Event) -> bool {
    let name = match event {
        Event::Start(e) | Event::Empty(e) => e.name(),
        Event::End(e) => e.name(),
        _ => return false,
    };
    opc::element_is(reader, name, opc::NS_DRAWINGML, b"r")
}

fn run_texts(xml: &str) -> Result<Vec<String>> {
    let mut reader = NsReader::from_str(xml);
    let mut body_depth = 0usize;
    let mut runs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        let event = reader.read_event().map_err(xml_err)?;
        let local = local_of(&event);
        let is_run = is_text_run(&reader, &event);
        match &event {
            Event::Eof => break,
            Event::Start(_) if local == b"txBody" => body_depth += 1,
            Event::End(_) if local == b"txBody" => body_depth = body_depth.saturating_sub(1),
            Event::Start(_) if is_run && body_depth > 0 => current = Some(String::new()),
            Event::Empty(_) if is_run && body_depth > 0 => runs.push(String::new()),
            Event::End(_) if is_run => {
                if let Some(text) = current.take() {
                    runs.push(text);
                }
            }
            Event::Start(_) if local == b"t" => in_text = current.is_some(),
            Event::End(_) if local == b"t" => in_text = false,
            Event::Text(e) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape().map_err(xml_err)?);
                }
            }
            _ => {}
        }
    }

    Ok(runs)
}

fn rewrite_slide(xml: &str, slide_num: usize, edits: &RunEdits) -> Result<Vec<u8>> {
    let mut reader = NsReader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut body_depth = 0usize;
    let mut run_index = 0usize;
    let mut pending: Option<Vec<Event>> = None;

    loop {
        let event = reader.read_event().map_err(xml_err)?;
        let is_run = is_text_run(&reader, &event);
        let is_body = local_of(&event) == b"txBody";
        match &event {
            Event::Eof => break,
            Event::Start(_) if is_body => body_depth += 1,
            Event::End(_) if is_body => body_depth = body_depth.saturating_sub(1),
            _ => {}
        }

        if let Some(mut run) = pending.take() {
            let closes = is_run && matches!(event, Event::End(_));
            run.push(event);
            if !closes {
                pending = Some(run);
                continue;
            }
            for ev in &run {
                writer.write_event(ev).map_err(xml_err)?;
            }
            let location = RunLocation { slide_num, run_index };
            if let Some(text) = edits.get(&location) {
                append_line(&mut writer, &run, text)?;
            }
            run_index += 1;
            continue;
        }

        if is_run && body_depth > 0 {
            if matches!(event, Event::Start(_)) {
                pending = Some(vec![event]);
                continue;
            }
            if matches!(event, Event::Empty(_)) {
                run_index += 1;
            }
        }
        writer.write_event(event).map_err(xml_err)?;
    }

    Ok(writer.into_inner().into_inner())
}

/// Write `<a:br/>` and a copy of `run` holding `text`.
fn append_line<W: Write>(writer: &mut Writer<W>, run: &[Event], text: &str) -> Result<()> {
    let prefix = match run.first() {
        Some(Event::Start(e)) => {
            let name = e.name().into_inner();
            name.iter()
                .position(|&b| b == b':')
                .map(|pos| String::from_utf8_lossy(&name[..=pos]).into_owned())
                .unwrap_or_default()
        }
        _ => String::new(),
    };
    let tag = |local: &str| format!("{}{}", prefix, local);

    writer
        .write_event(Event::Empty(BytesStart::new(tag("br"))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(tag("r"))))
        .map_err(xml_err)?;
    for ev in run_properties(run) {
        writer.write_event(ev).map_err(xml_err)?;
    }
    writer
        .write_event(Event::Start(BytesStart::new(tag("t"))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag("t"))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag("r"))))
        .map_err(xml_err)?;
    Ok(())
}

/// The `a:rPr` subtree among the direct children of a buffered run.
fn run_properties<'r, 'x>(run: &'r [Event<'x>]) -> &'r [Event<'x>] {
    let mut depth = 0usize;
    let mut begin = None;
    for (i, ev) in run.iter().enumerate().skip(1) {
        match ev {
            Event::Empty(_) if depth == 0 && local_of(ev) == b"rPr" => return &run[i..=i],
            Event::Start(_) => {
                if depth == 0 && local_of(ev) == b"rPr" {
                    begin = Some(i);
                }
                depth += 1;
            }
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = begin {
                        return &run[begin..=i];
                    }
                }
            }
            _ => {}
        }
    }
    &[]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_package, sample_pptx, slide_xml, text_shape};
    use quick_xml::Reader;

    #[test]
    fn test_collect_runs_in_presentation_order() {
        let slides = collect_runs(Cursor::new(sample_pptx())).unwrap();
        assert_eq!(
            slides,
            vec![
                SlideRuns {
                    slide_num: 1,
                    part_name: "ppt/slides/slide2.xml".to_string(),
                    runs: vec!["First slide".to_string()],
                },
                SlideRuns {
                    slide_num: 2,
                    part_name: "ppt/slides/slide1.xml".to_string(),
                    runs: vec!["Hello".to_string(), " world".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_rewrite_slide_appends_line_after_run() {
        let xml = slide_xml(&text_shape("Box", &[&["One", "Two"]]));
        let mut edits = RunEdits::new();
        edits.insert(RunLocation { slide_num: 1, run_index: 1 }, "Hai & ba".to_string());

        let out = String::from_utf8(rewrite_slide(&xml, 1, &edits).unwrap()).unwrap();
        assert!(out.contains(
            r#"<a:t>Two</a:t></a:r><a:br/><a:r><a:rPr lang="en-US" sz="1800" b="1"/><a:t>Hai &amp; ba</a:t></a:r>"#
        ));
        assert_eq!(run_texts(&out).unwrap(), vec!["One", "Two", "Hai & ba"]);
    }

    #[test]
    fn test_math_runs_are_not_text_runs() {
        let xml = slide_xml(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Eq"/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p xmlns:d="http://schemas.openxmlformats.org/drawingml/2006/main"><a:r><a:t>Area</a:t></a:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><mc:Choice xmlns:a14="http://schemas.microsoft.com/office/drawing/2010/main" Requires="a14"><a14:m><m:oMath xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"><m:r><m:t>x</m:t></m:r></m:oMath></a14:m></mc:Choice></mc:AlternateContent><d:r><d:t>tail</d:t></d:r></a:p></p:txBody></p:sp>"#,
        );
        assert_eq!(run_texts(&xml).unwrap(), vec!["Area", "tail"]);

        let mut edits = RunEdits::new();
        edits.insert(RunLocation { slide_num: 1, run_index: 1 }, "cuối".to_string());
        let out = String::from_utf8(rewrite_slide(&xml, 1, &edits).unwrap()).unwrap();
        assert!(out.contains("<m:r><m:t>x</m:t></m:r>"));
        assert!(out.contains("<d:t>tail</d:t></d:r><d:br/><d:r><d:t>cuối</d:t></d:r>"));
        assert_eq!(run_texts(&out).unwrap(), vec!["Area", "tail", "cuối"]);
    }

    #[test]
    fn test_run_properties_with_children() {
        let xml = r#"<a:r xmlns:a="a"><a:rPr b="1"><a:solidFill><a:srgbClr val="00FF00"/></a:solidFill></a:rPr><a:t>x</a:t></a:r>"#;
        let mut reader = Reader::from_str(xml);
        let mut events = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                ev => events.push(ev),
            }
        }
        let props = run_properties(&events);
        assert_eq!(props.len(), 5);
        assert_eq!(local_of(&props[0]), b"rPr");
        assert!(matches!(props[4], Event::End(_)));
    }

    #[test]
    fn test_rewrite_package_copies_other_parts() {
        let input = sample_pptx();
        let mut edits = RunEdits::new();
        edits.insert(RunLocation { slide_num: 2, run_index: 0 }, "Xin chào".to_string());

        let out = rewrite_runs(Cursor::new(input.clone()), Cursor::new(Vec::new()), &edits)
            .unwrap()
            .into_inner();

        let slides = collect_runs(Cursor::new(out.clone())).unwrap();
        assert_eq!(slides[0].runs, vec!["First slide"]);
        assert_eq!(slides[1].runs, vec!["Hello", "Xin chào", " world"]);

        let doc = PptxParser::new().parse(Cursor::new(out.clone()), "out.pptx").unwrap();
        let added = &doc.slides[1].shapes[0].paragraphs[0].runs[1];
        assert_eq!(added.bold, Some(true));
        assert_eq!(added.font_size, Some(18.0));

        let mut before = ZipArchive::new(Cursor::new(input)).unwrap();
        let mut after = ZipArchive::new(Cursor::new(out)).unwrap();
        assert_eq!(before.len(), after.len());
        for part in ["ppt/media/image1.png", "ppt/slides/slide2.xml", "ppt/presentation.xml"] {
            assert_eq!(
                opc::read_part_bytes(&mut before, part).unwrap(),
                opc::read_part_bytes(&mut after, part).unwrap()
            );
        }
    }

    #[test]
    fn test_no_edits_is_a_copy() {
        let input = build_package(&[
            ("ppt/presentation.xml", b"<p:presentation xmlns:p=\"p\"/>"),
            ("docProps/app.xml", b"<Properties/>"),
        ]);
        let out = rewrite_runs(Cursor::new(input.clone()), Cursor::new(Vec::new()), &RunEdits::new())
            .unwrap()
            .into_inner();
        let mut after = ZipArchive::new(Cursor::new(out)).unwrap();
        assert_eq!(opc::read_part_bytes(&mut after, "docProps/app.xml").unwrap(), b"<Properties/>");
    }
}

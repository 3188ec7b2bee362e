//! Presentation translation.

use crate::Translator;
use docmeta_core::Result;
use docmeta_pptx::{collect_runs, rewrite_runs, RunEdits, RunLocation};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;

pub const DEFAULT_SOURCE_LANG: &str = "en";
pub const DEFAULT_TARGET_LANG: &str = "vi";

/// Translate every slide run of `input` and write the result to `output`.
///
/// Each translation is added on a new line below its run, keeping the run's
/// formatting. Identical run texts are translated once and blank runs are
/// left alone. Returns the number of distinct texts translated.
pub async fn translate_pptx(
    input: &Path,
    output: &Path,
    translator: &dyn Translator,
    source: &str,
    target: &str,
) -> Result<usize> {
    let slides = collect_runs(BufReader::new(File::open(input)?))?;

    let mut translated: HashMap<String, String> = HashMap::new();
    let mut edits = RunEdits::new();
    for slide in &slides {
        for (run_index, text) in slide.runs.iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            let translation = match translated.get(text) {
                Some(t) => t.clone(),
                None => {
                    let t = translator.translate(text, source, target).await?;
                    translated.insert(text.clone(), t.clone());
                    t
                }
            };
            let location = RunLocation {
                slide_num: slide.slide_num,
                run_index,
            };
            edits.insert(location, translation);
        }
    }

    let bytes = rewrite_runs(BufReader::new(File::open(input)?), Cursor::new(Vec::new()), &edits)?
        .into_inner();
    fs::write(output, bytes)?;

    log::info!(
        "Translated {} ({} -> {}): {} runs, {} distinct texts",
        input.display(),
        source,
        target,
        edits.len(),
        translated.len()
    );
    Ok(translated.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docmeta_core::Error;
    use std::io::Write;
    use std::sync::Mutex;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Prefixes text with the target language and records every call.
    #[derive(Default)]
    struct RecordingTranslator {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Translator for RecordingTranslator {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            self.calls.lock().unwrap().push(text.to_string());
            Ok(format!("[{}] {}", target, text))
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _source: &str, _target: &str) -> Result<String> {
            Err(Error::TranslationError("offline".to_string()))
        }
    }

    fn slide(runs: &[&str]) -> String {
        let body: String = runs
            .iter()
            .map(|t| format!(r#"<a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r>"#, t))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p>{}</a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            body
        )
    }

    fn write_deck(path: &Path, slides: &[String]) {
        let mut rels = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let mut ids = String::new();
        for i in 1..=slides.len() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{i}.xml"/>"#
            ));
            ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + i, i));
        }
        rels.push_str("</Relationships>");
        let presentation = format!(
            r#"<p:presentation xmlns:p="p" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
            ids
        );

        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default();
        zip.start_file("ppt/presentation.xml", options).unwrap();
        zip.write_all(presentation.as_bytes()).unwrap();
        zip.start_file("ppt/_rels/presentation.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        for (i, xml) in slides.iter().enumerate() {
            zip.start_file(format!("ppt/slides/slide{}.xml", i + 1), options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn test_translate_dedupes_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pptx");
        let output = dir.path().join("out.pptx");
        write_deck(&input, &[slide(&["Hello", " ", "World"]), slide(&["Hello"])]);

        let translator = RecordingTranslator::default();
        let count = translate_pptx(&input, &output, &translator, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG)
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(*translator.calls.lock().unwrap(), vec!["Hello", "World"]);

        let slides = collect_runs(BufReader::new(File::open(&output).unwrap())).unwrap();
        assert_eq!(slides[0].runs, vec!["Hello", "[vi] Hello", " ", "World", "[vi] World"]);
        assert_eq!(slides[1].runs, vec!["Hello", "[vi] Hello"]);
    }

    #[tokio::test]
    async fn test_translation_error_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pptx");
        let output = dir.path().join("out.pptx");
        write_deck(&input, &[slide(&["Hello"])]);

        let err = translate_pptx(&input, &output, &FailingTranslator, "en", "vi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranslationError(_)));
        assert!(!output.exists());
    }
}

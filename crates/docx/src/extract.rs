//! Sidecar extraction for Word documents.

use crate::parser::DocxParser;
use docmeta_core::filename::part_stem;
use docmeta_core::{ensure_folder, save_metadata, DocxImage, DocxMetadata, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Extract paragraphs, tables and images from `docx_path` into `output_folder`.
///
/// Images are written next to the sidecar as `image_<media stem>.<ext>` and
/// `metadata.json` is saved last. Returns the metadata that was written.
pub fn extract_text_images_from_docx(docx_path: &Path, output_folder: &Path) -> Result<DocxMetadata> {
    ensure_folder(output_folder)?;

    let file = File::open(docx_path)?;
    let document = DocxParser::new().parse(BufReader::new(file))?;
    log::info!(
        "Parsed {}: {} paragraphs, {} tables, {} images",
        docx_path.display(),
        document.paragraphs.len(),
        document.tables.len(),
        document.images.len()
    );

    let mut images = Vec::with_capacity(document.images.len());
    for image in &document.images {
        let file_name = format!("image_{}.{}", part_stem(&image.part_name), image.ext);
        let path = output_folder.join(&file_name);
        fs::write(&path, &image.data)?;
        images.push(DocxImage {
            path: path.to_string_lossy().into_owned(),
            ext: image.ext.clone(),
        });
    }

    let metadata = DocxMetadata {
        paragraphs: document.paragraphs,
        images,
        tables: document.tables,
    };
    save_metadata(&metadata, output_folder)?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_package, document_xml, tiny_png, CONTENT_TYPES, ROOT_RELS};
    use docmeta_core::load_metadata;

    fn sample_docx() -> Vec<u8> {
        let doc = document_xml(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Title</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        );
        let doc_rels = r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/></Relationships>"#;
        let png = tiny_png();
        build_package(&[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", ROOT_RELS.as_bytes()),
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/media/image1.png", &png),
        ])
    }

    #[test]
    fn test_extract_writes_images_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        fs::write(&input, sample_docx()).unwrap();
        let out = dir.path().join("docx_output");

        let meta = extract_text_images_from_docx(&input, &out).unwrap();
        assert_eq!(meta.paragraphs.len(), 1);
        assert_eq!(meta.paragraphs[0].runs[0].bold, Some(true));
        assert_eq!(meta.tables.len(), 1);
        assert_eq!(meta.images.len(), 1);
        assert_eq!(meta.images[0].ext, "png");

        let image_path = out.join("image_image1.png");
        assert!(image_path.is_file());
        assert_eq!(meta.images[0].path, image_path.to_string_lossy());

        let loaded: DocxMetadata = load_metadata(&out).unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn test_extract_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_text_images_from_docx(&dir.path().join("nope.docx"), dir.path());
        assert!(matches!(result, Err(docmeta_core::Error::IoError(_))));
    }
}

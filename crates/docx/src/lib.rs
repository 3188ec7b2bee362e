//! DOCX (Office Open XML) backend.
//!
//! Reads `.docx` packages (ZIP archives of WordprocessingML parts) into the
//! sidecar schema, writes new packages, and rebuilds documents either from a
//! sidecar folder or from a [`TreeNode`](docmeta_core::TreeNode).

pub mod extract;
pub mod parser;
pub mod recreate;
pub mod tree;
pub mod writer;

pub use extract::extract_text_images_from_docx;
pub use parser::{DocxDocument, DocxParser, EmbeddedImage};
pub use recreate::{recreate_docx, recreate_docx_from_tree};
pub use tree::build_docx_tree;
pub use writer::{DocxBuilder, ParagraphId};

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    pub const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    /// Zip the given parts into an in-memory package.
    pub fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, data) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// A 2x1 red PNG.
    pub fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 1, image::Rgb([255, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Wrap body XML into a `word/document.xml` part.
    pub fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
            body
        )
    }
}

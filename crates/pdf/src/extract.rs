//! Page-level extraction of styled text and images.

use crate::images::{extract_image, image_ids, ExtractedImage};
use crate::interpreter::{Span, TextInterpreter};
use crate::objects::{inherited, media_box, pdf_err, resolve, stream_bytes};
use docmeta_core::{ensure_folder, save_metadata, PdfImage, PdfMetadata, PdfPage, Result, TextInstance};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static EMPTY_RESOURCES: LazyLock<Dictionary> = LazyLock::new(Dictionary::new);

/// Text and images of one page, before anything is written to disk.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// 1-based page number.
    pub page_num: usize,
    pub width: f64,
    pub height: f64,
    /// Spans in drawing order, top-left origin.
    pub text_instances: Vec<TextInstance>,
    pub images: Vec<ExtractedImage>,
}

/// Open a PDF file.
pub fn load_document(path: &Path) -> Result<Document> {
    Document::load(path).map_err(pdf_err)
}

/// Extract every page of `doc`.
pub fn read_pages(doc: &Document) -> Vec<ExtractedPage> {
    let mut interpreter = TextInterpreter::new(doc);
    doc.get_pages()
        .into_iter()
        .enumerate()
        .map(|(i, (_, page_id))| read_page(doc, &mut interpreter, i + 1, page_id))
        .collect()
}

fn read_page<'a>(
    doc: &'a Document,
    interpreter: &mut TextInterpreter<'a>,
    page_num: usize,
    page_id: ObjectId,
) -> ExtractedPage {
    let (left, bottom, width, height) = media_box(doc, page_id);
    let resources = inherited(doc, page_id, b"Resources")
        .and_then(|o| o.as_dict().ok())
        .unwrap_or(&*EMPTY_RESOURCES);

    let content = page_content(doc, page_id);
    let top = bottom + height;
    let text_instances = interpreter
        .page_spans(&content, resources)
        .into_iter()
        .map(|span| to_text_instance(span, left, top))
        .collect();

    let images = image_ids(doc, resources)
        .into_iter()
        .filter_map(|id| match extract_image(doc, id) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Skipping image {:?} on page {}: {}", id, page_num, e);
                None
            }
        })
        .collect();

    ExtractedPage {
        page_num,
        width,
        height,
        text_instances,
        images,
    }
}

/// Concatenated content streams of a page.
fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let streams: Vec<&Object> = match page.get(b"Contents").map(|o| resolve(doc, o)) {
        Ok(Object::Array(items)) => items.iter().map(|o| resolve(doc, o)).collect(),
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    };

    let mut content = Vec::new();
    for obj in streams {
        if let Object::Stream(stream) = obj {
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&stream_bytes(stream));
        }
    }
    content
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Convert a user-space span to a top-left-origin text instance.
fn to_text_instance(span: Span, left: f64, top: f64) -> TextInstance {
    let x0 = round3(span.x0 - left);
    TextInstance {
        text: span.text,
        font_size: round3(span.font_size),
        font_color: span.color,
        font_name: span.font_name,
        bbox: [
            x0,
            round3(top - span.top),
            round3(span.x1 - left),
            round3(top - span.bottom),
        ],
        origin: Some([x0, round3(top - span.baseline)]),
        flags: span.flags,
        bold: span.bold,
        italic: span.italic,
    }
}

/// Extract text spans and images from `pdf_path` into `output_folder`.
///
/// Images are saved as `page_<page>_image_<n>.<ext>` (both 1-based) and the
/// sidecar is written last. Returns the metadata that was written.
pub fn extract_text_images_from_pdf(pdf_path: &Path, output_folder: &Path) -> Result<PdfMetadata> {
    ensure_folder(output_folder)?;
    let doc = load_document(pdf_path)?;
    let pages = read_pages(&doc);
    log::info!("Parsed {}: {} pages", pdf_path.display(), pages.len());

    let mut metadata = PdfMetadata::default();
    for page in pages {
        let mut images = Vec::with_capacity(page.images.len());
        for (index, image) in page.images.iter().enumerate() {
            let name = format!("page_{}_image_{}.{}", page.page_num, index + 1, image.ext);
            let path = output_folder.join(name);
            fs::write(&path, &image.data)?;
            images.push(PdfImage {
                index,
                path: path.to_string_lossy().into_owned(),
                ext: image.ext.clone(),
            });
        }

        metadata.pages.push(PdfPage {
            page_num: page.page_num,
            width: page.width,
            height: page.height,
            text_instances: page.text_instances,
            images,
        });
    }

    save_metadata(&metadata, output_folder)?;
    Ok(metadata)
}

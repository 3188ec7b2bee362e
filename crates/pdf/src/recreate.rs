//! Rebuilding a PDF from a sidecar folder.

use crate::encoding::encode_win_ansi;
use crate::objects::pdf_err;
use docmeta_core::color::rgb_from_int;
use docmeta_core::sidecar::resolve_asset;
use docmeta_core::{load_metadata, process_text, Error, PdfMetadata, PdfPage, Result, TextInstance, TextProcessor};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs;
use std::path::Path;

/// Base-14 fonts used for recreated text, by `(bold, italic)`.
const FONTS: [(&str, &str, bool, bool); 4] = [
    ("F1", "Helvetica", false, false),
    ("F2", "Helvetica-Bold", true, false),
    ("F3", "Helvetica-Oblique", false, true),
    ("F4", "Helvetica-BoldOblique", true, true),
];

/// Font size used when a sidecar span has none.
const FALLBACK_FONT_SIZE: f64 = 11.0;

/// Recreate a PDF from the `metadata.json` in `folder`, writing it to `output`.
///
/// Each text instance is drawn at its baseline origin in Helvetica with its
/// recorded size and colour. Images are fitted into a column of boxes down
/// the left side of the page, one box per image index.
pub fn recreate_pdf(folder: &Path, output: &Path, processor: Option<&dyn TextProcessor>) -> Result<()> {
    let metadata: PdfMetadata = load_metadata(folder)?;
    let mut doc = build_document(folder, &metadata, processor)?;

    doc.compress();
    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| pdf_err(e.into()))?;
    fs::write(output, buf)?;
    log::info!("Recreated PDF {} ({} pages)", output.display(), metadata.pages.len());
    Ok(())
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn build_document(folder: &Path, metadata: &PdfMetadata, processor: Option<&dyn TextProcessor>) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_dict = Dictionary::new();
    for (key, base_font, _, _) in FONTS {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(key, id);
    }
    let fonts_id = doc.add_object(font_dict);

    let mut kids = Vec::with_capacity(metadata.pages.len());
    for page in &metadata.pages {
        let page_id = add_page(&mut doc, folder, page, pages_id, fonts_id, processor)?;
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn add_page(
    doc: &mut Document,
    folder: &Path,
    page: &PdfPage,
    pages_id: ObjectId,
    fonts_id: ObjectId,
    processor: Option<&dyn TextProcessor>,
) -> Result<ObjectId> {
    let mut operations = Vec::new();

    for span in &page.text_instances {
        text_operations(span, page.height, processor, &mut operations);
    }

    let mut xobjects = Dictionary::new();
    for (n, image) in page.images.iter().enumerate() {
        let path = resolve_asset(folder, &image.path)?;
        let data = fs::read(&path)?;
        let Some((image_id, width, height)) = add_image_xobject(doc, &data, &image.ext)? else {
            log::warn!("Skipping image {} that cannot be embedded", path.display());
            continue;
        };

        let name = format!("Im{}", n + 1);
        xobjects.set(name.as_str(), image_id);

        let (x, y, w, h) = fit_image_rect(image.index, width as f64, height as f64);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "cm",
            vec![real(w), 0.into(), 0.into(), real(h), real(x), real(page.height - y - h)],
        ));
        operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        operations.push(Operation::new("Q", vec![]));
    }

    let content = Content { operations }
        .encode()
        .map_err(|e| Error::PdfParseError(format!("failed to encode page content: {}", e)))?;
    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content)));

    let mut resources = dictionary! { "Font" => fonts_id };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), real(page.width), real(page.height)],
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

fn text_operations(
    span: &TextInstance,
    page_height: f64,
    processor: Option<&dyn TextProcessor>,
    operations: &mut Vec<Operation>,
) {
    let text = process_text(&span.text, processor);
    if text.is_empty() {
        return;
    }

    let font_key = FONTS
        .iter()
        .find(|(_, _, bold, italic)| *bold == span.bold && *italic == span.italic)
        .map(|(key, ..)| *key)
        .unwrap_or("F1");
    let size = if span.font_size > 0.0 { span.font_size } else { FALLBACK_FONT_SIZE };
    let [x, y] = span.origin.unwrap_or([span.bbox[0], span.bbox[3]]);
    let [r, g, b] = rgb_from_int(span.font_color);

    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec![Object::Name(font_key.as_bytes().to_vec()), real(size)]));
    operations.push(Operation::new(
        "rg",
        vec![
            real(r as f64 / 255.0),
            real(g as f64 / 255.0),
            real(b as f64 / 255.0),
        ],
    ));
    operations.push(Operation::new(
        "Tm",
        vec![1.into(), 0.into(), 0.into(), 1.into(), real(x), real(page_height - y)],
    ));
    operations.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(&text), StringFormat::Literal)],
    ));
    operations.push(Operation::new("ET", vec![]));
}

/// Fit an image into the box for `index`, keeping its aspect ratio.
///
/// Boxes are `(72, 72 + i*200, 300, 400 + i*200)` in top-left coordinates;
/// the image is centred in its box. Returns `(x, y_top, width, height)`.
fn fit_image_rect(index: usize, img_w: f64, img_h: f64) -> (f64, f64, f64, f64) {
    let (x0, y0) = (72.0, 72.0 + index as f64 * 200.0);
    let (box_w, box_h) = (300.0 - 72.0, 328.0);
    let scale = (box_w / img_w.max(1.0)).min(box_h / img_h.max(1.0));
    let (w, h) = (img_w * scale, img_h * scale);
    (x0 + (box_w - w) / 2.0, y0 + (box_h - h) / 2.0, w, h)
}

/// Add an image XObject. Returns `None` for formats that cannot be embedded.
fn add_image_xobject(doc: &mut Document, data: &[u8], ext: &str) -> Result<Option<(ObjectId, u32, u32)>> {
    if ext.eq_ignore_ascii_case("jpx") {
        return Ok(None);
    }
    if matches!(image::guess_format(data), Ok(image::ImageFormat::Jpeg)) {
        return add_jpeg_xobject(doc, data).map(Some);
    }

    let decoded = image::load_from_memory(data)
        .map_err(|e| Error::ImageError(format!("failed to decode image: {}", e)))?;
    let (width, height) = (decoded.width(), decoded.height());
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let mask_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        )));
        dict.set("SMask", mask_id);
    }
    let id = doc.add_object(Object::Stream(Stream::new(dict, decoded.to_rgb8().into_raw())));
    Ok(Some((id, width, height)))
}

/// Embed JPEG bytes as-is under `DCTDecode`.
fn add_jpeg_xobject(doc: &mut Document, data: &[u8]) -> Result<(ObjectId, u32, u32)> {
    let header = JpegHeader::parse(data)
        .ok_or_else(|| Error::ImageError("JPEG without a frame header".to_string()))?;
    let color_space = match header.components {
        1 => "DeviceGray",
        4 => "DeviceCMYK",
        _ => "DeviceRGB",
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => header.width as i64,
        "Height" => header.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    // Adobe CMYK JPEGs store inverted samples.
    if header.components == 4 && header.adobe {
        let decode: Vec<Object> = (0..4).flat_map(|_| [Object::Integer(1), Object::Integer(0)]).collect();
        dict.set("Decode", decode);
    }

    let stream = Stream::new(dict, data.to_vec()).with_compression(false);
    Ok((doc.add_object(Object::Stream(stream)), header.width, header.height))
}

/// Frame information read from JPEG markers.
#[derive(Debug, PartialEq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// An `APP14` Adobe segment precedes the frame.
    adobe: bool,
}

impl JpegHeader {
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return None;
        }

        let mut adobe = false;
        let mut pos = 2;
        while pos + 1 < data.len() {
            if data[pos] != 0xFF {
                pos += 1;
                continue;
            }
            let marker = data[pos + 1];
            pos += 2;
            if marker == 0xFF || marker == 0x00 || (0xD0..=0xD7).contains(&marker) {
                continue;
            }

            let length = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
            match marker {
                0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                    let frame = data.get(pos..pos + 8)?;
                    return Some(Self {
                        height: u16::from_be_bytes([frame[3], frame[4]]) as u32,
                        width: u16::from_be_bytes([frame[5], frame[6]]) as u32,
                        components: frame[7],
                        adobe,
                    });
                }
                0xEE => adobe |= data.get(pos + 2..pos + 7) == Some(b"Adobe".as_slice()),
                _ => {}
            }
            pos += length;
        }
        None
    }
}

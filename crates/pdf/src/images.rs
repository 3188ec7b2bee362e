//! Image XObject discovery and decoding.

use crate::objects::{filters, get, get_dict, resolve, stream_bytes};
use docmeta_core::{Error, Result};
use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::io::{Cursor, Read};

/// Nesting limit when searching form XObjects for images.
const MAX_FORM_DEPTH: usize = 8;

/// An image ready to be written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub object_id: ObjectId,
    /// `jpeg`, `jpx` or `png`.
    pub ext: String,
    pub data: Vec<u8>,
}

/// Image XObjects reachable from `resources`, each object once, in resource order.
pub fn image_ids(doc: &Document, resources: &Dictionary) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    collect_image_ids(doc, resources, &mut seen, &mut ids, 0);
    ids
}

fn collect_image_ids(
    doc: &Document,
    resources: &Dictionary,
    seen: &mut HashSet<ObjectId>,
    ids: &mut Vec<ObjectId>,
    depth: usize,
) {
    let Some(xobjects) = get_dict(doc, resources, b"XObject") else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        if !seen.insert(*id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            continue;
        };
        match get(doc, &stream.dict, b"Subtype").and_then(|o| o.as_name().ok()) {
            Some(b"Image") => ids.push(*id),
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(form_resources) = get_dict(doc, &stream.dict, b"Resources") {
                    collect_image_ids(doc, form_resources, seen, ids, depth + 1);
                }
            }
            _ => {}
        }
    }
}

/// Decode an image XObject into a file format.
///
/// JPEG and JPEG 2000 data is passed through once any Flate layers in front
/// of it are removed. Raw 8-bit gray, RGB and CMYK samples are re-encoded as PNG.
pub fn extract_image(doc: &Document, id: ObjectId) -> Result<ExtractedImage> {
    let stream = doc
        .get_object(id)
        .and_then(|o| o.as_stream())
        .map_err(|e| Error::PdfParseError(format!("image {:?}: {}", id, e)))?;

    let filter_names = filters(doc, &stream.dict);
    let last = filter_names.last().map(Vec::as_slice);

    let outer = &filter_names[..filter_names.len().saturating_sub(1)];
    let (ext, data) = match last {
        Some(b"DCTDecode") => ("jpeg", strip_filters(&stream.content, outer)?),
        Some(b"JPXDecode") => ("jpx", strip_filters(&stream.content, outer)?),
        _ => ("png", samples_to_png(doc, stream)?),
    };

    Ok(ExtractedImage {
        object_id: id,
        ext: ext.to_string(),
        data,
    })
}

/// Undo the filters applied on top of an encoded image, outermost first.
fn strip_filters(content: &[u8], filters: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut data = content.to_vec();
    for filter in filters {
        match filter.as_slice() {
            b"FlateDecode" | b"Fl" => {
                let mut out = Vec::new();
                ZlibDecoder::new(data.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| Error::ImageError(format!("FlateDecode failed: {}", e)))?;
                data = out;
            }
            other => {
                return Err(Error::ImageError(format!(
                    "unsupported filter before image data: {}",
                    String::from_utf8_lossy(other)
                )));
            }
        }
    }
    Ok(data)
}

/// Number of colour components of an image colour space.
fn components(doc: &Document, dict: &Dictionary) -> Option<usize> {
    match get(doc, dict, b"ColorSpace")? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(arr) => {
            let family = arr.first().map(|o| resolve(doc, o))?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let profile = arr.get(1).map(|o| resolve(doc, o))?.as_stream().ok()?;
                    get(doc, &profile.dict, b"N")?.as_i64().ok().map(|n| n as usize)
                }
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}

fn samples_to_png(doc: &Document, stream: &Stream) -> Result<Vec<u8>> {
    let dict = &stream.dict;
    let dim = |key: &[u8]| get(doc, dict, key).and_then(|o| o.as_i64().ok()).unwrap_or(0);
    let (width, height) = (dim(b"Width"), dim(b"Height"));
    let bpc = get(doc, dict, b"BitsPerComponent")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if width <= 0 || height <= 0 {
        return Err(Error::ImageError("image without dimensions".to_string()));
    }
    if bpc != 8 {
        return Err(Error::ImageError(format!("unsupported bits per component: {}", bpc)));
    }
    let comps = components(doc, dict)
        .ok_or_else(|| Error::ImageError("unsupported colour space".to_string()))?;

    let (width, height) = (width as u32, height as u32);
    let mut samples = stream_bytes(stream);
    let expected = width as usize * height as usize * comps;
    if samples.len() < expected {
        return Err(Error::ImageError(format!(
            "truncated image data: {} of {} bytes",
            samples.len(),
            expected
        )));
    }
    samples.truncate(expected);

    let image = match comps {
        1 => image::GrayImage::from_raw(width, height, samples).map(image::DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, samples).map(image::DynamicImage::ImageRgb8),
        4 => image::RgbImage::from_raw(width, height, cmyk_to_rgb(&samples))
            .map(image::DynamicImage::ImageRgb8),
        n => return Err(Error::ImageError(format!("unsupported component count: {}", n))),
    }
    .ok_or_else(|| Error::ImageError("image buffer size mismatch".to_string()))?;

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::ImageError(e.to_string()))?;
    Ok(out.into_inner())
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            [
                ((255 - px[0] as u16) * k / 255) as u8,
                ((255 - px[1] as u16) * k / 255) as u8,
                ((255 - px[2] as u16) * k / 255) as u8,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn add_image(doc: &mut Document, dict: Dictionary, data: Vec<u8>) -> ObjectId {
        doc.add_object(Object::Stream(Stream::new(dict, data)))
    }

    #[test]
    fn test_rgb_samples_become_png() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 255, 0],
        );

        let extracted = extract_image(&doc, id).unwrap();
        assert_eq!(extracted.ext, "png");
        let decoded = image::load_from_memory(&extracted.data).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_dct_passthrough() {
        let mut doc = Document::with_version("1.5");
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        );
        let extracted = extract_image(&doc, id).unwrap();
        assert_eq!(extracted.ext, "jpeg");
        assert_eq!(extracted.data, jpeg);
    }

    #[test]
    fn test_flate_wrapped_dct_passthrough() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x02, 0xFF, 0xD9];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&jpeg).unwrap();
        let wrapped = encoder.finish().unwrap();

        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
            },
            wrapped,
        );
        let extracted = extract_image(&doc, id).unwrap();
        assert_eq!(extracted.ext, "jpeg");
        assert_eq!(extracted.data, jpeg);
    }

    #[test]
    fn test_unknown_filter_before_dct_fails() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "Filter" => vec![Object::Name(b"LZWDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
            },
            vec![0],
        );
        assert!(matches!(extract_image(&doc, id), Err(Error::ImageError(_))));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 255, 0, 0, 0]), vec![255, 255, 255, 0, 255, 255]);
    }

    #[test]
    fn test_unsupported_depth() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
            },
            vec![0xAA],
        );
        assert!(matches!(extract_image(&doc, id), Err(Error::ImageError(_))));
    }

    #[test]
    fn test_image_ids_dedupe_and_forms() {
        let mut doc = Document::with_version("1.5");
        let img = add_image(
            &mut doc,
            dictionary! { "Subtype" => "Image", "Width" => 1, "Height" => 1 },
            vec![0],
        );
        let nested = add_image(
            &mut doc,
            dictionary! { "Subtype" => "Image", "Width" => 1, "Height" => 1 },
            vec![0],
        );
        let form = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => img, "Im9" => nested },
                },
            },
            Vec::new(),
        );
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => img, "Im1" => img, "Fm0" => form },
        };
        assert_eq!(image_ids(&doc, &resources), vec![img, nested]);
    }
}

//! Small helpers over `lopdf` objects.

use docmeta_core::Error;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Wrap a `lopdf` error.
pub(crate) fn pdf_err(e: lopdf::Error) -> Error {
    Error::PdfParseError(e.to_string())
}

/// Follow a reference, returning the object itself for direct objects.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look up `key` in `dict` and follow a reference if needed.
pub(crate) fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o))
}

pub(crate) fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn get_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    get(doc, dict, key)?.as_array().ok()
}

pub(crate) fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match get(doc, dict, key)? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

pub(crate) fn get_f64(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    get(doc, dict, key).and_then(object_to_f64)
}

/// Numeric value of an integer or real object.
pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Look up an attribute a page may inherit from its ancestors in the page tree.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Guard against cyclic Parent chains.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Page size `(left, bottom, width, height)` from the MediaBox, A4 when absent.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> (f64, f64, f64, f64) {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.iter().map(|o| object_to_f64(resolve(doc, o))).collect());

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => {
            let (left, right) = if x0 <= x1 { (*x0, *x1) } else { (*x1, *x0) };
            let (bottom, top) = if y0 <= y1 { (*y0, *y1) } else { (*y1, *y0) };
            (left, bottom, right - left, top - bottom)
        }
        _ => (
            0.0,
            0.0,
            docmeta_core::types::DEFAULT_PAGE_WIDTH,
            docmeta_core::types::DEFAULT_PAGE_HEIGHT,
        ),
    }
}

/// Bytes of a stream, decompressed when it carries a filter `lopdf` understands.
pub(crate) fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    if stream.dict.get(b"Filter").is_ok() {
        match stream.decompressed_content() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Could not decompress stream: {}", e);
                stream.content.clone()
            }
        }
    } else {
        stream.content.clone()
    }
}

/// Names of the filters applied to a stream, outermost first.
pub(crate) fn filters(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match get(doc, dict, b"Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| match resolve(doc, o) {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_inherited_media_box() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        assert_eq!(media_box(&doc, page_id), (0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_media_box_default() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert_eq!(media_box(&doc, page_id), (0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(object_to_f64(&Object::Integer(3)), Some(3.0));
        assert_eq!(object_to_f64(&Object::Real(1.5)), Some(1.5));
        assert_eq!(object_to_f64(&Object::Null), None);
    }
}

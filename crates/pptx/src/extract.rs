//! Sidecar extraction for presentations.

use crate::parser::PptxParser;
use docmeta_core::{ensure_folder, save_metadata, PptxMetadata, Result, Slide, SlideImage};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Extract slide text shapes and pictures from `pptx_path` into `output_folder`.
///
/// Pictures are written as `slide_<n>_image_<i>.<ext>` (both 1-based) and
/// `metadata.json` is saved last.
pub fn extract_text_images_from_pptx(pptx_path: &Path, output_folder: &Path) -> Result<PptxMetadata> {
    ensure_folder(output_folder)?;

    let filename = pptx_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let document = PptxParser::new().parse(BufReader::new(File::open(pptx_path)?), &filename)?;
    log::info!("Parsed {}: {} slides", pptx_path.display(), document.slides.len());

    let mut metadata = PptxMetadata::default();
    for parsed in document.slides {
        let mut images = Vec::with_capacity(parsed.images.len());
        for (index, media) in parsed.images.iter().enumerate() {
            let name = format!("slide_{}_image_{}.{}", parsed.slide_num, index + 1, media.ext);
            let path = output_folder.join(name);
            fs::write(&path, &media.data)?;
            images.push(SlideImage {
                index,
                path: path.to_string_lossy().into_owned(),
                ext: media.ext.clone(),
            });
        }

        metadata.slides.push(Slide {
            slide_num: parsed.slide_num,
            shapes: parsed.shapes,
            images,
        });
    }

    save_metadata(&metadata, output_folder)?;
    Ok(metadata)
}

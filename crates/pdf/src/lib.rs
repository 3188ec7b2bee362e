//! PDF backend.
//!
//! Interprets page content streams with `lopdf` to recover styled text spans
//! and image XObjects, writes new PDFs from a sidecar folder and builds a
//! [`TreeNode`](docmeta_core::TreeNode) view of a document.

pub mod cmap;
pub mod encoding;
pub mod extract;
pub mod font;
pub mod images;
pub mod interpreter;
pub mod objects;
pub mod recreate;
pub mod tree;

pub use extract::{extract_text_images_from_pdf, load_document, read_pages, ExtractedPage};
pub use images::ExtractedImage;
pub use recreate::recreate_pdf;
pub use tree::build_pdf_tree;

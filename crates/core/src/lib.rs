//! Core domain types, sidecar I/O, the generic document tree and content
//! transforms shared by the PDF, DOCX and PPTX backends.

pub mod color;
pub mod error;
pub mod filename;
pub mod opc;
pub mod sidecar;
pub mod transform;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use sidecar::{ensure_folder, load_metadata, save_metadata, METADATA_FILE};
pub use transform::{process_text, TextProcessor, Transform};
pub use tree::{display_tree, NodeType, TreeNode};
pub use types::{
    DocumentFormat, DocxImage, DocxMetadata, Paragraph, PdfImage, PdfMetadata, PdfPage,
    PptxMetadata, Run, Shape, Slide, SlideImage, Table, TableCell, TableRow, TextInstance,
};

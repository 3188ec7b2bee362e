//! PPTX (Office Open XML) backend.
//!
//! Reads slide text shapes and pictures into the sidecar schema, and
//! rewrites slide runs in place while copying every other package part
//! untouched.

pub mod extract;
pub mod parser;
pub mod rewrite;

pub use extract::extract_text_images_from_pptx;
pub use parser::{ParsedSlide, PptxDocument, PptxParser, SlideMedia};
pub use rewrite::{collect_runs, rewrite_runs, RunEdits, RunLocation, SlideRuns};

//! Error types for document extraction and reconstruction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting, recreating or translating documents.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read or write a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the DOCX package.
    #[error("DOCX parsing error: {0}")]
    DocxParseError(String),

    /// Failed to parse the PDF file structure.
    #[error("PDF parsing error: {0}")]
    PdfParseError(String),

    /// Failed to parse the PPTX package.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for DOCX/PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error (for DOCX/PPTX).
    #[error("XML error: {0}")]
    XmlError(String),

    /// Sidecar (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// An embedded image could not be decoded or encoded.
    #[error("Image error: {0}")]
    ImageError(String),

    /// The translation service failed or returned an unexpected payload.
    #[error("Translation error: {0}")]
    TranslationError(String),

    /// A transform name that does not match any built-in transform.
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    /// A required input (file, folder, sidecar field) is missing.
    #[error("Missing input: {0}")]
    MissingInput(String),
}

//! Route definitions for the HTTP API.

mod download;
mod extract;
mod health;
mod recreate;
mod translate;
mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Uploads of office documents and scanned PDFs exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Upload and download
        .route("/upload", post(upload::upload_file))
        .route("/download", get(download::download))
        // Extraction
        .route("/extract_text_images_from_pdf", post(extract::extract_pdf))
        .route("/extract_text_images_from_docx", post(extract::extract_docx))
        .route("/extract_text_images_from_pptx", post(extract::extract_pptx))
        // Transforms and recreation
        .route("/convert_text_to_uppercase", post(recreate::convert_text_to_uppercase))
        .route("/transform", post(recreate::transform))
        .route("/recreate_docx", post(recreate::recreate_docx))
        .route("/recreate_pdf", post(recreate::recreate_pdf))
        // Translation
        .route("/translate_text_in_pptx", post(translate::translate_text_in_pptx))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // Attach state
        .with_state(state)
}

pub use download::*;
pub use extract::*;
pub use health::*;
pub use recreate::*;
pub use translate::*;
pub use upload::*;

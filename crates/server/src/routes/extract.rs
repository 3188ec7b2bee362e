//! Extraction endpoints.

use crate::error::ApiResult;
use crate::paths::resolve_request_path;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use docmeta_core::sidecar::metadata_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ExtractPdfRequest {
    pub pdf_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractDocxRequest {
    pub docx_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractPptxRequest {
    pub pptx_path: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub status: String,
    pub metadata_path: String,
}

/// POST /extract_text_images_from_pdf
pub async fn extract_pdf(
    State(state): State<AppState>,
    Json(req): Json<ExtractPdfRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let input = resolve_request_path(&state, &req.pdf_path)?;
    extract_into(state.output_dir().join("pdf_output"), move |folder| {
        docmeta_pdf::extract_text_images_from_pdf(&input, folder).map(|_| ())
    })
    .await
}

/// POST /extract_text_images_from_docx
pub async fn extract_docx(
    State(state): State<AppState>,
    Json(req): Json<ExtractDocxRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let input = resolve_request_path(&state, &req.docx_path)?;
    extract_into(state.output_dir().join("docx_output"), move |folder| {
        docmeta_docx::extract_text_images_from_docx(&input, folder).map(|_| ())
    })
    .await
}

/// POST /extract_text_images_from_pptx
pub async fn extract_pptx(
    State(state): State<AppState>,
    Json(req): Json<ExtractPptxRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let input = resolve_request_path(&state, &req.pptx_path)?;
    extract_into(state.output_dir().join("pptx_output"), move |folder| {
        docmeta_pptx::extract_text_images_from_pptx(&input, folder).map(|_| ())
    })
    .await
}

async fn extract_into<F>(folder: PathBuf, extract: F) -> ApiResult<Json<ExtractResponse>>
where
    F: FnOnce(&Path) -> docmeta_core::Result<()> + Send + 'static,
{
    let target = folder.clone();
    tokio::task::spawn_blocking(move || extract(&target)).await??;

    Ok(Json(ExtractResponse {
        status: "success".to_string(),
        metadata_path: metadata_path(&folder).display().to_string(),
    }))
}

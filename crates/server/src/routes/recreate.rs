//! Transform and recreation endpoints.

use crate::error::{ApiError, ApiResult};
use crate::paths::resolve_request_path;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use docmeta_core::{DocumentFormat, TextProcessor, Transform};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct TransformRequest {
    /// Sidecar folder produced by an extraction.
    pub file_path: String,
    pub file_type: String,
    /// Transform name; `/convert_text_to_uppercase` ignores it.
    #[serde(default)]
    pub transform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecreateRequest {
    pub output_folder: String,
}

#[derive(Debug, Serialize)]
pub struct OutputResponse {
    pub status: String,
    pub output_path: String,
}

impl OutputResponse {
    pub fn success(path: &std::path::Path) -> Self {
        Self {
            status: "success".to_string(),
            output_path: path.display().to_string(),
        }
    }
}

/// POST /convert_text_to_uppercase
pub async fn convert_text_to_uppercase(
    State(state): State<AppState>,
    Json(req): Json<TransformRequest>,
) -> ApiResult<Json<OutputResponse>> {
    run_transform(&state, &req.file_path, &req.file_type, Transform::Uppercase).await
}

/// POST /transform
pub async fn transform(
    State(state): State<AppState>,
    Json(req): Json<TransformRequest>,
) -> ApiResult<Json<OutputResponse>> {
    let name = req.transform.as_deref().unwrap_or("identity");
    let transform = Transform::from_str(name)?;
    run_transform(&state, &req.file_path, &req.file_type, transform).await
}

/// POST /recreate_docx
pub async fn recreate_docx(
    State(state): State<AppState>,
    Json(req): Json<RecreateRequest>,
) -> ApiResult<Json<OutputResponse>> {
    let folder = resolve_request_path(&state, &req.output_folder)?;
    let output = state.output_dir().join("recreated_docx.docx");
    let target = output.clone();
    tokio::task::spawn_blocking(move || docmeta_docx::recreate_docx(&folder, &target, None)).await??;
    Ok(Json(OutputResponse::success(&output)))
}

/// POST /recreate_pdf
pub async fn recreate_pdf(
    State(state): State<AppState>,
    Json(req): Json<RecreateRequest>,
) -> ApiResult<Json<OutputResponse>> {
    let folder = resolve_request_path(&state, &req.output_folder)?;
    let output = state.output_dir().join("recreated_pdf.pdf");
    let target = output.clone();
    tokio::task::spawn_blocking(move || docmeta_pdf::recreate_pdf(&folder, &target, None)).await??;
    Ok(Json(OutputResponse::success(&output)))
}

async fn run_transform(
    state: &AppState,
    folder: &str,
    file_type: &str,
    transform: Transform,
) -> ApiResult<Json<OutputResponse>> {
    let format = DocumentFormat::from_str(file_type)
        .ok()
        .filter(|f| *f != DocumentFormat::Pptx)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported file type: {}", file_type)))?;
    let folder = resolve_request_path(state, folder)?;

    let output: PathBuf = state
        .output_dir()
        .join(format!("{}_output.{}", transform.name(), format.extension()));
    let target = output.clone();

    tokio::task::spawn_blocking(move || {
        let processor: &dyn TextProcessor = &transform;
        match format {
            DocumentFormat::Pdf => docmeta_pdf::recreate_pdf(&folder, &target, Some(processor)),
            _ => docmeta_docx::recreate_docx(&folder, &target, Some(processor)),
        }
    })
    .await??;

    Ok(Json(OutputResponse::success(&output)))
}

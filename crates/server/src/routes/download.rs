//! File download endpoint.

use crate::error::{ApiError, ApiResult};
use crate::paths::resolve_request_path;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use docmeta_core::filename::{content_type_from_ext, secure_filename};
use docmeta_core::DocumentFormat;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub file_path: String,
}

/// GET /download?file_path=
pub async fn download(State(state): State<AppState>, Query(query): Query<DownloadQuery>) -> ApiResult<impl IntoResponse> {
    let path = resolve_request_path(&state, &query.file_path)?;
    if !path.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read {}: {}", path.display(), e)))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(secure_filename)
        .unwrap_or_default();
    let disposition = format!("attachment; filename=\"{}\"", name);

    Ok((
        [
            (header::CONTENT_TYPE, media_type(&path).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

fn media_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match DocumentFormat::from_extension(ext) {
        Some(format) => format.mime_type(),
        None if ext.eq_ignore_ascii_case("json") => "application/json",
        None => content_type_from_ext(ext),
    }
}

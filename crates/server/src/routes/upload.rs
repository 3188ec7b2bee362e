//! File upload endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use docmeta_core::filename::secure_filename;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_path: String,
}

/// POST /upload
///
/// Stores the multipart field `file` in the upload directory under a
/// sanitized name, replacing any earlier upload with the same name.
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = secure_filename(field.file_name().unwrap_or_default());
        if filename.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        let path = state.upload_dir().join(&filename);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store {}: {}", filename, e)))?;
        log::info!("Stored upload {} ({} bytes)", path.display(), data.len());

        return Ok(Json(UploadResponse {
            file_path: path.display().to_string(),
        }));
    }

    Err(ApiError::bad_request("No file part"))
}

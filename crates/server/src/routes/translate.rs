//! Presentation translation endpoint.

use crate::error::ApiResult;
use crate::paths::resolve_request_path;
use crate::routes::recreate::OutputResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use docmeta_translate::{translate_pptx, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub input_pptx_path: String,
    #[serde(default)]
    pub from_lang: Option<String>,
    #[serde(default)]
    pub to_lang: Option<String>,
}

/// POST /translate_text_in_pptx
pub async fn translate_text_in_pptx(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<Json<OutputResponse>> {
    let input = resolve_request_path(&state, &req.input_pptx_path)?;
    let from = req.from_lang.as_deref().unwrap_or(DEFAULT_SOURCE_LANG);
    let to = req.to_lang.as_deref().unwrap_or(DEFAULT_TARGET_LANG);
    let output = state.output_dir().join("translated_pptx.pptx");

    let translator = state.translator();
    translate_pptx(&input, &output, translator.as_ref(), from, to).await?;

    Ok(Json(OutputResponse::success(&output)))
}

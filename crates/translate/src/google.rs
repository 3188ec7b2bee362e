//! Google Translate web endpoint client.

use crate::Translator;
use async_trait::async_trait;
use docmeta_core::{Error, Result};
use reqwest::Client;
use serde_json::Value;

/// Public endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://translate.googleapis.com";

/// Translator backed by the `translate_a/single` endpoint.
pub struct GoogleTranslator {
    client: Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Use a different host, e.g. a proxy or a local stub.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let response = self
            .client
            .get(format!("{}/translate_a/single", self.base_url))
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| Error::TranslationError(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TranslationError(format!("HTTP {}: {}", status, body)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::TranslationError(format!("failed to parse response: {}", e)))?;
        let translated = parse_response(&payload)?;
        log::debug!("Translated {} chars {} -> {}", text.len(), source, target);
        Ok(translated)
    }
}

/// Join the translated segments of a `translate_a/single` payload.
///
/// The payload looks like `[[["Xin chào", "Hello", ...], ...], null, "en", ...]`.
fn parse_response(payload: &Value) -> Result<String> {
    let segments = payload
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::TranslationError("unexpected response shape".to_string()))?;

    Ok(segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_joins_segments() {
        let payload = json!([
            [["Xin chào. ", "Hello. ", null, null, 10], ["Thế giới", "World", null, null, 10]],
            null,
            "en"
        ]);
        assert_eq!(parse_response(&payload).unwrap(), "Xin chào. Thế giới");
    }

    #[test]
    fn test_parse_response_rejects_other_shapes() {
        assert!(matches!(
            parse_response(&json!({"error": "quota"})),
            Err(Error::TranslationError(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(GoogleTranslator::with_base_url("http://localhost:9/").base_url(), "http://localhost:9");
    }

    #[tokio::test]
    async fn test_blank_text_skips_request() {
        // Port 9 is unreachable; a request would fail.
        let translator = GoogleTranslator::with_base_url("http://127.0.0.1:9");
        assert_eq!(translator.translate("  \n", "en", "vi").await.unwrap(), "  \n");
    }
}

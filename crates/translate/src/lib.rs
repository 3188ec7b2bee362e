//! Machine translation of presentation text.
//!
//! [`translate_pptx`] appends a translation under every run of every slide
//! text body, using any [`Translator`]; [`GoogleTranslator`] talks to the
//! public Google Translate web endpoint.

pub mod google;
pub mod pptx;

pub use google::GoogleTranslator;
pub use pptx::{translate_pptx, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG};

use async_trait::async_trait;
use docmeta_core::Result;

/// A text translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` to `target` (ISO 639-1 codes).
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

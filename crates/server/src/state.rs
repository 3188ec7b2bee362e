//! Application state.

use crate::config::ServerConfig;
use docmeta_translate::{GoogleTranslator, Translator};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    translator: Arc<dyn Translator>,
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl AppState {
    /// Create the working directories and a translator for `config`.
    pub fn new(config: ServerConfig) -> std::io::Result<Self> {
        let translator: Arc<dyn Translator> = match &config.translate_url {
            Some(url) => Arc::new(GoogleTranslator::with_base_url(url)),
            None => Arc::new(GoogleTranslator::new()),
        };
        Self::with_translator(config, translator)
    }

    /// Like [`AppState::new`] with a caller-provided translator.
    pub fn with_translator(config: ServerConfig, translator: Arc<dyn Translator>) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.upload_dir)?;
        std::fs::create_dir_all(&config.output_dir)?;
        let upload_root = config.upload_dir.canonicalize()?;
        let output_root = config.output_dir.canonicalize()?;

        Ok(Self {
            config: Arc::new(config),
            translator,
            upload_root,
            output_root,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn translator(&self) -> Arc<dyn Translator> {
        Arc::clone(&self.translator)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Canonical directories request paths may point into.
    pub fn allowed_roots(&self) -> [&Path; 2] {
        [&self.upload_root, &self.output_root]
    }
}

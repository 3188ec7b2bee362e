//! Server configuration from the environment.

use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Runtime settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where `/upload` stores incoming files.
    pub upload_dir: PathBuf,
    /// Where sidecar folders and recreated documents are written.
    pub output_dir: PathBuf,
    /// Translation endpoint; `None` uses the public Google endpoint.
    pub translate_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("results"),
            translate_url: None,
        }
    }
}

impl ServerConfig {
    /// Read `DOCMETA_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("DOCMETA_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("Ignoring invalid DOCMETA_PORT {:?}", raw);
                defaults.port
            }),
            None => defaults.port,
        };

        Self {
            host: non_empty("DOCMETA_HOST").unwrap_or(defaults.host),
            port,
            upload_dir: non_empty("DOCMETA_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: non_empty("DOCMETA_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            translate_url: non_empty("DOCMETA_TRANSLATE_URL"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert!(config.translate_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCMETA_HOST", "127.0.0.1"),
            ("DOCMETA_PORT", "8081"),
            ("DOCMETA_OUTPUT_DIR", "/tmp/out"),
            ("DOCMETA_TRANSLATE_URL", "http://localhost:9000"),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.translate_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = ServerConfig::from_lookup(|k| (k == "DOCMETA_PORT").then(|| "http".to_string()));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}

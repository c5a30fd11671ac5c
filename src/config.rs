//! Service configuration from environment variables

use crate::error::{Error, Result};
use crate::source::SourcePolicy;
use crate::vision::yolo::DEFAULT_INPUT_SIZE;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Which surface the binary serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// axum HTTP server
    #[default]
    Http,
    /// MCP over stdio
    Mcp,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "mcp" | "stdio" => Ok(Transport::Mcp),
            other => Err(format!("expected `http` or `mcp`, got `{}`", other)),
        }
    }
}

/// Configuration for the classifier service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    /// HTTP listen address
    pub bind: SocketAddr,
    /// HTTP request body limit
    pub max_upload_bytes: usize,
    /// Identity-card detector weights
    pub model_path: PathBuf,
    /// Square detector input size in pixels
    pub model_input_size: u32,
    pub tesseract_cmd: String,
    pub tesseract_lang: Option<String>,
    /// Path sandbox and download limits for MCP sources
    pub sources: SourcePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Http,
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
            model_path: PathBuf::from("./best.onnx"),
            model_input_size: DEFAULT_INPUT_SIZE,
            tesseract_cmd: "tesseract".to_string(),
            tesseract_lang: None,
            sources: SourcePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("TAXDOC_TRANSPORT") {
            config.transport = parse("TAXDOC_TRANSPORT", &v)?;
        }
        if let Some(v) = get("TAXDOC_BIND") {
            config.bind = parse("TAXDOC_BIND", &v)?;
        }
        if let Some(v) = get("TAXDOC_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("TAXDOC_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = get("TAXDOC_MODEL_PATH") {
            config.model_path = PathBuf::from(v);
        }
        if let Some(v) = get("TAXDOC_MODEL_INPUT_SIZE") {
            config.model_input_size = parse("TAXDOC_MODEL_INPUT_SIZE", &v)?;
            if config.model_input_size == 0 || config.model_input_size % 32 != 0 {
                return Err(Error::Config {
                    key: "TAXDOC_MODEL_INPUT_SIZE".to_string(),
                    reason: "must be a positive multiple of 32".to_string(),
                });
            }
        }
        if let Some(v) = get("TESSERACT_CMD") {
            config.tesseract_cmd = v;
        }
        config.tesseract_lang = get("TESSERACT_LANG");
        if let Some(v) = get("TAXDOC_RESOURCE_DIRS") {
            config.sources.resource_dirs = v
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Some(v) = get("TAXDOC_ALLOW_PRIVATE_URLS") {
            config.sources.allow_private_urls = parse_bool("TAXDOC_ALLOW_PRIVATE_URLS", &v)?;
        }
        if let Some(v) = get("TAXDOC_MAX_DOWNLOAD_BYTES") {
            config.sources.max_download_bytes = parse("TAXDOC_MAX_DOWNLOAD_BYTES", &v)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config {
            key: key.to_string(),
            reason: format!("not a boolean: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.model_path, PathBuf::from("./best.onnx"));
        assert_eq!(config.model_input_size, 640);
        assert_eq!(config.tesseract_cmd, "tesseract");
        assert_eq!(config.tesseract_lang, None);
        assert!(config.sources.resource_dirs.is_empty());
        assert!(!config.sources.allow_private_urls);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TAXDOC_TRANSPORT", "MCP"),
            ("TAXDOC_BIND", "127.0.0.1:9000"),
            ("TAXDOC_MODEL_INPUT_SIZE", "1280"),
            ("TESSERACT_LANG", "eng"),
            ("TAXDOC_RESOURCE_DIRS", "/srv/a, /srv/b,,"),
            ("TAXDOC_ALLOW_PRIVATE_URLS", "yes"),
            ("TAXDOC_MAX_DOWNLOAD_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.transport, Transport::Mcp);
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.model_input_size, 1280);
        assert_eq!(config.tesseract_lang.as_deref(), Some("eng"));
        assert_eq!(
            config.sources.resource_dirs,
            vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
        );
        assert!(config.sources.allow_private_urls);
        assert_eq!(config.sources.max_download_bytes, 1024);
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config =
            ServerConfig::from_lookup(lookup(&[("TESSERACT_CMD", "  "), ("TAXDOC_BIND", "")]))
                .unwrap();
        assert_eq!(config.tesseract_cmd, "tesseract");
        assert_eq!(config.bind.port(), 8000);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("TAXDOC_MAX_UPLOAD_BYTES", "lots")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { ref key, .. } if key == "TAXDOC_MAX_UPLOAD_BYTES"));

        let err = ServerConfig::from_lookup(lookup(&[("TAXDOC_TRANSPORT", "grpc")])).unwrap_err();
        assert!(err.to_string().contains("TAXDOC_TRANSPORT"));

        assert!(ServerConfig::from_lookup(lookup(&[("TAXDOC_MODEL_INPUT_SIZE", "100")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("TAXDOC_ALLOW_PRIVATE_URLS", "maybe")])).is_err());
    }
}

//! Application configuration
//!
//! Read from an optional YAML file. Every key has a default, so a missing file
//! (or a file that sets only a few keys) is a valid configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{CupError, Result},
    predict::FallbackPolicy,
};

/// Default config file looked up by the CLI
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fitted artifact locations
    pub artifacts: ArtifactPaths,
    /// Dataset-level settings
    pub data: DataConfig,
    /// Caller-side settings
    pub client: ClientConfig,
    /// Server-side settings
    pub serving: ServingConfig,
}

/// Fitted artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// Preprocessor JSON
    pub preprocessor: PathBuf,
    /// Model JSON
    pub model: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            preprocessor: PathBuf::from("artifacts/preprocessor.json"),
            model: PathBuf::from("artifacts/model.json"),
        }
    }
}

/// Dataset-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Column order the fitted transform expects; empty means "ask the transform"
    pub input_columns: Vec<String>,
}

/// Caller-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Named-row prediction endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/predict_named".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Server-side settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Placeholder used when no model is loaded
    pub fallback: FallbackPolicy,
}

impl AppConfig {
    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Config`] if the text is not valid YAML for this shape.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| CupError::Config {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Config`] if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| CupError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_yaml(&text, &path.display().to_string())?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.artifacts.model, PathBuf::from("artifacts/model.json"));
        assert_eq!(config.client.timeout_secs, 10);
        assert!(config.data.input_columns.is_empty());
        assert_eq!(config.serving.fallback, FallbackPolicy::RowMean);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "data:\n  input_columns: [Aroma, Flavor]\nserving:\n  fallback: nan_mean\n",
            "inline",
        )
        .expect("config");
        assert_eq!(config.data.input_columns, vec!["Aroma", "Flavor"]);
        assert_eq!(config.serving.fallback, FallbackPolicy::NanMean);
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = AppConfig::load(Path::new("/nonexistent/cupscore.yaml")).expect("config");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "client:\n  timeout_secs: [not, a, number]").expect("write");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CupError::Config { .. }));
    }

    #[test]
    fn test_unknown_fallback_rejected() {
        assert!(AppConfig::from_yaml("serving:\n  fallback: median\n", "inline").is_err());
    }
}

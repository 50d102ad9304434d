//! Process configuration.
//!
//! [`Settings`] is read once at startup from a TOML or JSON file (chosen by
//! extension) and then overridden by `TABLESCOUT_*` environment variables.
//! A missing file is not an error; defaults are used and a warning is logged.
//!
//! Per-node agent configuration lives in [`agents`] and is the only part that
//! can change at runtime (through the coordinator's config operations).

pub mod agents;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::llm::LlmClientConfig;

pub use agents::{AgentConfig, PipelineConfig};

/// Default location of the settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "tablescout.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Model endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub default_model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            default_model: agents::DEFAULT_MODEL.into(),
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    /// Client configuration for these settings.
    pub fn client_config(&self) -> LlmClientConfig {
        LlmClientConfig {
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
            ..LlmClientConfig::openai_compatible(
                self.api_key.clone(),
                self.default_model.clone(),
                self.base_url.clone(),
            )
        }
    }
}

/// Structured output validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Path of the single UI message schema.  `None` uses the bundled one.
    pub schema_path: Option<PathBuf>,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            schema_path: None,
            max_retries: 1,
        }
    }
}

/// Tool provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Directory holding `restaurants.json` and `cafes.json`.
    pub data_dir: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Public base URL; static assets are referenced under `{base_url}/static`.
    pub base_url: String,
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 10002,
            base_url: "http://localhost:10002".into(),
            static_dir: PathBuf::from("images"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the process needs to start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub pipeline: PipelineConfig,
    pub validation: ValidationSettings,
    pub tools: ToolSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from `path` (or [`DEFAULT_CONFIG_PATH`]) and apply
    /// environment overrides.  A `.env` file in the working directory is
    /// loaded first when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = ?env_file, "loaded .env");
        }

        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut settings = Self::from_file(path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.pipeline.validate()?;
        Ok(settings)
    }

    /// Read settings from a file without touching the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = ?path, "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let settings: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| AgentError::ConfigError {
                reason: format!("failed to parse JSON config: {e}"),
            })?
        } else {
            toml::from_str(&content).map_err(|e| AgentError::ConfigError {
                reason: format!("failed to parse TOML config: {e}"),
            })?
        };

        info!(path = ?path, "configuration loaded from file");
        Ok(settings)
    }

    /// Apply `TABLESCOUT_*` overrides read through `lookup`.
    ///
    /// `TABLESCOUT_LLM_API_KEY` falls back to `OPENAI_API_KEY`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("TABLESCOUT_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = var("TABLESCOUT_LLM_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.llm.api_key = key;
        }
        if let Some(model) = var("TABLESCOUT_LLM_MODEL") {
            self.llm.default_model = model;
        }
        if let Some(path) = var("TABLESCOUT_SCHEMA_PATH") {
            self.validation.schema_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = var("TABLESCOUT_DATA_DIR") {
            self.tools.data_dir = PathBuf::from(dir);
        }
        if let Some(retries) = var("TABLESCOUT_MAX_RETRIES") {
            self.validation.max_retries =
                retries.trim().parse().map_err(|_| AgentError::ConfigError {
                    reason: format!("TABLESCOUT_MAX_RETRIES must be an integer, got `{retries}`"),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.validation.max_retries, 1);
    }

    #[test]
    fn toml_file_overrides_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablescout.toml");
        std::fs::write(
            &path,
            r#"
[llm]
base_url = "http://localhost:4000/v1"

[validation]
max_retries = 3

[pipeline.presenter_agent]
model = "openai.gpt-4.1"
name = "presenter_agent"
temperature = 0.1
"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.llm.base_url, "http://localhost:4000/v1");
        assert_eq!(settings.validation.max_retries, 3);
        assert_eq!(settings.pipeline.presenter_agent.model, "openai.gpt-4.1");
        assert_eq!(settings.pipeline.place_finder_agent.name, "food_place_agent");
        assert_eq!(settings.server.port, 10002);
    }

    #[test]
    fn shipped_config_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join(DEFAULT_CONFIG_PATH);
        assert!(path.exists(), "{} is missing", path.display());

        let settings = Settings::from_file(&path).unwrap();
        settings.pipeline.validate().unwrap();
        assert_eq!(settings.server.port, 10002);
        assert_eq!(settings.tools.data_dir, PathBuf::from("data"));
        assert_eq!(settings.pipeline.presenter_agent.name, "presenter_agent");
        assert_eq!(settings.pipeline.place_finder_agent.name, "food_place_agent");
    }

    #[test]
    fn json_file_is_detected_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablescout.json");
        std::fs::write(&path, r#"{"tools": {"data_dir": "/srv/places"}}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.tools.data_dir, PathBuf::from("/srv/places"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[llm\nbase_url = ").unwrap();
        assert!(matches!(Settings::from_file(&path), Err(AgentError::ConfigError { .. })));
    }

    #[test]
    fn env_overrides_apply_with_api_key_fallback() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-fallback"),
                ("TABLESCOUT_LLM_MODEL", "local-model"),
                ("TABLESCOUT_MAX_RETRIES", "2"),
                ("TABLESCOUT_DATA_DIR", "  "),
            ]))
            .unwrap();

        assert_eq!(settings.llm.api_key, "sk-fallback");
        assert_eq!(settings.llm.default_model, "local-model");
        assert_eq!(settings.validation.max_retries, 2);
        assert_eq!(settings.tools.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn invalid_retry_count_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env(env(&[("TABLESCOUT_MAX_RETRIES", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let mut settings = Settings::default();
        settings.llm.api_key = "sk-secret".into();
        let rendered = toml::to_string(&settings).unwrap();
        assert!(!rendered.contains("sk-secret"));
    }
}

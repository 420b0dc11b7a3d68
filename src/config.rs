//! Typed configuration surface (spec §6) + its default loader.
//!
//! The typed [`Config`] struct is core surface: every other component reads
//! its settings from it. *Parsing* config files is explicitly out of scope
//! per spec §1 ("external collaborators"), but a default TOML-based loader
//! is included so the crate is runnable out of the box, grounded on
//! `PPRAMANIK62-kaze`'s `config/loader.rs` + `config/paths.rs` shape (the
//! teacher itself has no config module to draw from).

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::provider::{AnthropicProvider, OllamaProvider, OpenAiProvider, Provider};

const APP_NAME: &str = "codecraft";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the platform config directory")]
    NoConfigDir,
    #[error("io error at {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub approval_required: bool,
    pub results_cache_size: usize,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self { max_concurrency: 4, timeout_secs: 30, approval_required: true, results_cache_size: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_tokens: u32,
    pub strategy: String,
    pub persist_path: Option<PathBuf>,
    pub max_turns: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { max_tokens: 4096, strategy: "recency".to_string(), persist_path: None, max_turns: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub sandbox: bool,
    pub allowed_paths: Vec<String>,
    pub denied_paths: Vec<String>,
    pub max_file_size_bytes: u64,
    pub audit: bool,
    pub backup_dir: PathBuf,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            sandbox: true,
            allowed_paths: Vec::new(),
            denied_paths: vec![".git".to_string()],
            max_file_size_bytes: 10 * 1024 * 1024,
            audit: true,
            backup_dir: PathBuf::from(".backups"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,
    pub default_provider: Option<String>,
    pub tools: ToolDefaults,
    pub conversation: ConversationConfig,
    pub safety: SafetyConfig,
}

impl Config {
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join(APP_NAME))
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads from the well-known per-user path, writing a commented default
    /// file on first run.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default = Self::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io { path: parent.display().to_string(), source: e })?;
            }
            let toml = toml::to_string_pretty(&default)?;
            std::fs::write(&path, toml).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
            return Ok(default);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse { path: path.display().to_string(), source: e })
    }

    /// Constructs a [`Provider`] per configured entry, resolving API keys
    /// from environment variables named `{NAME}_API_KEY` when a config entry
    /// leaves `api_key` unset.
    pub fn build_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .map(|p| {
                let api_key = p.api_key.clone().or_else(|| std::env::var(format!("{}_API_KEY", p.name.to_uppercase())).ok());
                let provider: Arc<dyn Provider> = match p.kind {
                    ProviderKind::Ollama => Arc::new(OllamaProvider::new(p.model.clone(), p.base_url.clone())),
                    ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(p.model.clone(), api_key.unwrap_or_default(), p.base_url.clone())),
                    ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(p.model.clone(), api_key.unwrap_or_default(), p.base_url.clone())),
                };
                provider
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.tools.max_concurrency, config.tools.max_concurrency);
    }

    #[test]
    fn build_providers_constructs_one_per_entry() {
        let mut config = Config::default();
        config.providers.push(ProviderConfig {
            name: "local".to_string(),
            kind: ProviderKind::Ollama,
            model: "llama3".to_string(),
            base_url: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            rate_limit_rpm: None,
        });
        assert_eq!(config.build_providers().len(), 1);
    }
}

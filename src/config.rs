//! Configuration management for codesim

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable overriding the local embedding endpoint
pub const OLLAMA_HOST_ENV: &str = "CODESIM_OLLAMA_HOST";

/// Environment variable overriding the local embedding model
pub const EMBEDDING_MODEL_ENV: &str = "CODESIM_EMBEDDING_MODEL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embeddings: EmbeddingsConfig,
    pub index: IndexConfig,
    pub duplicates: DuplicatesConfig,
    #[serde(skip)]
    pub verbose: bool,
}

/// Which embedding backends may be used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Local first, remote after the first local failure
    #[default]
    Hybrid,
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub mode: EmbeddingMode,
    pub local: LocalEmbeddingConfig,
    pub remote: RemoteEmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEmbeddingConfig {
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for RemoteEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory under the project root holding the index document
    pub directory: String,
    pub exclude_patterns: Vec<String>,
    pub max_file_size_mb: u32,
    /// Maximum number of in-flight embedding calls
    pub concurrency: usize,
    /// Wall-clock budget for a whole build
    pub build_timeout_secs: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            directory: ".codesim".to_string(),
            exclude_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "target".to_string(),
                "__pycache__".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "*.min.js".to_string(),
            ],
            max_file_size_mb: 10,
            concurrency: 8,
            build_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    pub threshold: f64,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self { threshold: 0.85 }
    }
}

impl Config {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.duplicates.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "duplicates.threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.index.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "index.concurrency must be at least 1".to_string(),
            ));
        }
        if self.index.directory.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "index.directory must not be empty".to_string(),
            ));
        }
        if self.embeddings.local.dimension == 0 || self.embeddings.remote.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        if self.embeddings.mode == EmbeddingMode::Local && !self.embeddings.local.enabled {
            return Err(ConfigError::Invalid(
                "embeddings.mode is \"local\" but embeddings.local.enabled is false".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(OLLAMA_HOST_ENV).filter(|v| !v.is_empty()) {
            self.embeddings.local.endpoint = host;
        }
        if let Some(model) = lookup(EMBEDDING_MODEL_ENV).filter(|v| !v.is_empty()) {
            self.embeddings.local.model = model;
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("com", "codesim", "codesim")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

fn resolve_path(custom_path: Option<&str>) -> Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => config_path(),
    }
}

/// Load configuration from file or use defaults
pub fn load_config(custom_path: Option<&str>) -> Result<Config> {
    let path = resolve_path(custom_path)?;

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        Config::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;

    Ok(config)
}

/// Initialize configuration file with defaults
pub fn init_config(custom_path: Option<&str>) -> Result<()> {
    let path = resolve_path(custom_path)?;

    if path.exists() {
        println!("Configuration file already exists at {:?}", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let content = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    println!("Configuration initialized at {:?}", path);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}

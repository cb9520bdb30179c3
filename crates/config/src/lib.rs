//! Configuration loading, validation, and management for Syllabot.
//!
//! Loads configuration from `~/.syllabot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.syllabot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model selection and sampling
    #[serde(default)]
    pub models: ModelsConfig,

    /// Similarity search backend
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Durable conversation state
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// HTTP surface
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Turn pipeline thresholds and windows
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("models", &self.models)
            .field("retrieval", &self.retrieval)
            .field("checkpoint", &self.checkpoint)
            .field("gateway", &self.gateway)
            .field("pipeline", &self.pipeline)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("api_key", &redact(&self.api_key))
            .field("top_k", &self.top_k)
            .field("hnsw_ef", &self.hnsw_ef)
            .field("content_key", &self.content_key)
            .field("metadata_key", &self.metadata_key)
            .field("corpus_path", &self.corpus_path)
            .finish()
    }
}

impl std::fmt::Debug for CheckpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointConfig")
            .field("backend", &self.backend)
            .field("sqlite_path", &self.sqlite_path)
            .field("database_url", &redact(&self.database_url))
            .finish()
    }
}

/// Which model serves each pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_chat_model")]
    pub answer: String,

    #[serde(default = "default_chat_model")]
    pub rewrite: String,

    #[serde(default = "default_chat_model")]
    pub title: String,

    #[serde(default = "default_chat_model")]
    pub summary: String,

    #[serde(default = "default_embedding_model")]
    pub embedding: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_chat_model() -> String {
    "gpt-4.1-nano".into()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            answer: default_chat_model(),
            rewrite: default_chat_model(),
            title: default_chat_model(),
            summary: default_chat_model(),
            embedding: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "qdrant" or "memory"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Passages per search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_hnsw_ef")]
    pub hnsw_ef: u32,

    /// Payload field holding the passage text
    #[serde(default = "default_content_key")]
    pub content_key: String,

    /// Payload field holding the passage metadata
    #[serde(default = "default_metadata_key")]
    pub metadata_key: String,

    /// JSON array or JSON Lines file of passages loaded by the memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,
}

fn default_retrieval_backend() -> String {
    "qdrant".into()
}
fn default_qdrant_url() -> String {
    "http://qdrant:6333".into()
}
fn default_collection() -> String {
    "rtu_curriculum".into()
}
fn default_top_k() -> usize {
    6
}
fn default_hnsw_ef() -> u32 {
    256
}
fn default_content_key() -> String {
    "page_content".into()
}
fn default_metadata_key() -> String {
    "metadata".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            top_k: default_top_k(),
            hnsw_ef: default_hnsw_ef(),
            content_key: default_content_key(),
            metadata_key: default_metadata_key(),
            corpus_path: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// "sqlite", "postgres" or "memory"
    #[serde(default = "default_checkpoint_backend")]
    pub backend: String,

    /// Defaults to `~/.syllabot/checkpoints.sqlite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_checkpoint_backend() -> String {
    "sqlite".into()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            sqlite_path: None,
            database_url: None,
        }
    }
}

impl CheckpointConfig {
    /// The SQLite file to open, falling back to the config directory.
    pub fn resolved_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("checkpoints.sqlite"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Windows count individual messages, not user/assistant pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// History messages shown to the query rewriter
    #[serde(default = "default_rewrite_window")]
    pub rewrite_window: usize,

    /// History messages shown to the answer generator
    #[serde(default = "default_answer_window")]
    pub answer_window: usize,

    /// Unsummarized messages that trigger a summary refresh
    #[serde(default = "default_summarize_after")]
    pub summarize_after: usize,

    #[serde(default = "default_title_max_words")]
    pub title_max_words: usize,
}

fn default_rewrite_window() -> usize {
    4
}
fn default_answer_window() -> usize {
    3
}
fn default_summarize_after() -> usize {
    6
}
fn default_title_max_words() -> usize {
    6
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rewrite_window: default_rewrite_window(),
            answer_window: default_answer_window(),
            summarize_after: default_summarize_after(),
            title_max_words: default_title_max_words(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

const RETRIEVAL_BACKENDS: &[&str] = &["qdrant", "memory"];
const CHECKPOINT_BACKENDS: &[&str] = &["sqlite", "postgres", "memory"];

impl AppConfig {
    /// Load configuration from the default path (~/.syllabot/config.toml).
    ///
    /// Environment overrides:
    /// - `SYLLABOT_API_KEY`, then `OPENAI_API_KEY`
    /// - `SYLLABOT_PROVIDER`
    /// - `QDRANT_URL`
    /// - `DATABASE_URL` (switches the checkpoint backend to postgres in
    ///   builds with the `postgres` feature)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("SYLLABOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("SYLLABOT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(url) = lookup("QDRANT_URL") {
            self.retrieval.url = url;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            if !cfg!(feature = "postgres") {
                tracing::warn!(
                    backend = %self.checkpoint.backend,
                    "DATABASE_URL ignored: postgres checkpoints are not available in this build"
                );
            } else {
                if self.checkpoint.backend != "memory" {
                    self.checkpoint.backend = "postgres".into();
                }
                self.checkpoint.database_url = Some(url);
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".syllabot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(ConfigError::ValidationError(
                "models.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        if !RETRIEVAL_BACKENDS.contains(&self.retrieval.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown retrieval backend '{}'",
                self.retrieval.backend
            )));
        }

        if self.retrieval.backend == "memory" && self.retrieval.corpus_path.is_none() {
            return Err(ConfigError::ValidationError(
                "retrieval backend 'memory' requires corpus_path".into(),
            ));
        }

        if !CHECKPOINT_BACKENDS.contains(&self.checkpoint.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown checkpoint backend '{}'",
                self.checkpoint.backend
            )));
        }

        if self.checkpoint.backend == "postgres" && self.checkpoint.database_url.is_none() {
            return Err(ConfigError::ValidationError(
                "checkpoint backend 'postgres' requires database_url".into(),
            ));
        }

        let p = &self.pipeline;
        for (name, value) in [
            ("rewrite_window", p.rewrite_window),
            ("answer_window", p.answer_window),
            ("summarize_after", p.summarize_after),
            ("title_max_words", p.title_max_words),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "pipeline.{name} must be > 0"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            models: ModelsConfig::default(),
            retrieval: RetrievalConfig::default(),
            checkpoint: CheckpointConfig::default(),
            gateway: GatewayConfig::default(),
            pipeline: PipelineConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

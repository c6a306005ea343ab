//! Configuration module for the document QA retrieval layer.
//!
//! Settings are layered, later sources winning:
//! - Default values
//! - TOML configuration file (`.docqa/settings.toml` or `--config`)
//! - Environment variables prefixed with `DOCQA_`
//! - The conventional credential variables listed below
//!
//! # Environment Variables
//!
//! Prefixed variables use double underscores to separate nested levels:
//! - `DOCQA_STORE__UPSERT_BATCH_SIZE=50` sets `store.upsert_batch_size`
//! - `DOCQA_EMBEDDING__PROVIDER=local` sets `embedding.provider`
//! - `DOCQA_MIGRATION__NAMESPACE=archive` sets `migration.namespace`
//!
//! Credentials are also read from their usual unprefixed names:
//! `PINECONE_API_KEY`, `PINECONE_ENV`, `PINECONE_INDEX_NAME` and `OPENAI_API_KEY`.
//! Secrets are never written back by [`Settings::save`].

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::embedding::ProviderChoice;

/// Directory holding the settings file and the local model cache.
pub const CONFIG_DIR: &str = ".docqa";

/// Unprefixed environment variables mapped onto settings keys.
const CREDENTIAL_VARS: [(&str, &str); 4] = [
    ("PINECONE_API_KEY", "store.api_key"),
    ("PINECONE_ENV", "store.environment"),
    ("PINECONE_INDEX_NAME", "store.index_name"),
    ("OPENAI_API_KEY", "embedding.api_key"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVariable(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    #[error("Configuration file already exists at {0}. Use --force to overwrite")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// `auto`, `openai` or `local`
    #[serde(default)]
    pub provider: ProviderChoice,

    /// Cloud provider key (usually from `OPENAI_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_dimension")]
    pub openai_dimension: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// fastembed model used when the cloud provider is not selected
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Where downloaded local models are kept
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: PathBuf,
}

/// Which vector index implementation to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Pinecone,
    /// Process-local index, lost on exit
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Usually from `PINECONE_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Usually from `PINECONE_ENV`, e.g. `us-east-1-aws`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Usually from `PINECONE_INDEX_NAME`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default = "default_controller_url")]
    pub controller_url: String,

    /// Records per remote upsert call
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Pause between remote upsert calls
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Entries kept by the query/ingest embedding cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long to wait for a newly created index to become ready
    #[serde(default = "default_index_ready_timeout_secs")]
    pub index_ready_timeout_secs: u64,
}

/// Credentials the hosted backend cannot run without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PineconeCredentials {
    pub api_key: String,
    pub environment: String,
    pub index_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MigrationConfig {
    /// Directory holding the legacy store
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Namespace migrated chunks are written to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Texts per embedding call during re-embedding
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Sample queries run by the verify stage
    #[serde(default = "default_verify_queries")]
    pub verify_queries: Vec<String>,

    #[serde(default = "default_verify_top_k")]
    pub verify_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `store = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_openai_dimension() -> usize {
    1536
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_local_model() -> String {
    crate::embedding::DEFAULT_LOCAL_MODEL.to_string()
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("models")
}
fn default_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_upsert_batch_size() -> usize {
    100
}
fn default_batch_pause_ms() -> u64 {
    100
}
fn default_cache_capacity() -> usize {
    crate::embedding::DEFAULT_CACHE_CAPACITY
}
fn default_index_ready_timeout_secs() -> u64 {
    120
}
fn default_source_dir() -> PathBuf {
    PathBuf::from("vector_db")
}
fn default_namespace() -> String {
    "migrated".to_string()
}
fn default_embed_batch_size() -> usize {
    50
}
fn default_verify_queries() -> Vec<String> {
    [
        "artificial intelligence",
        "machine learning",
        "data processing",
        "business intelligence",
        "document analysis",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_verify_top_k() -> usize {
    3
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            migration: MigrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderChoice::default(),
            api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            openai_dimension: default_openai_dimension(),
            request_timeout_secs: default_request_timeout_secs(),
            local_model: default_local_model(),
            model_cache_dir: default_model_cache_dir(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            api_key: None,
            environment: None,
            index_name: None,
            controller_url: default_controller_url(),
            upsert_batch_size: default_upsert_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            cache_capacity: default_cache_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
            index_ready_timeout_secs: default_index_ready_timeout_secs(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            namespace: default_namespace(),
            embed_batch_size: default_embed_batch_size(),
            verify_queries: default_verify_queries(),
            verify_top_k: default_verify_top_k(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl StoreConfig {
    /// Return the hosted-index credentials, or name the first one missing.
    ///
    /// Blank values count as missing.
    pub fn require_credentials(&self) -> ConfigResult<PineconeCredentials> {
        fn present(value: &Option<String>, var: &'static str) -> ConfigResult<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::MissingVariable(var))
        }

        Ok(PineconeCredentials {
            api_key: present(&self.api_key, "PINECONE_API_KEY")?,
            environment: present(&self.environment, "PINECONE_ENV")?,
            index_name: present(&self.index_name, "PINECONE_INDEX_NAME")?,
        })
    }
}

impl Settings {
    /// Load configuration from all sources, using the nearest `.docqa/settings.toml`.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::find_workspace_config().unwrap_or_else(Self::default_path);
        Self::load_from(config_path)
    }

    /// Load configuration with `path` as the file layer.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores stay
            .merge(Env::prefixed("DOCQA_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }));

        for (var, key) in CREDENTIAL_VARS {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }

        figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// `.docqa/settings.toml` relative to the current directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_DIR).join("settings.toml")
    }

    /// Find the settings file by looking for a `.docqa` directory,
    /// searching from the current directory up to root.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Save current configuration to file. Secrets are omitted.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Render as TOML, the way [`Settings::save`] would write it.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write a default settings file at `path`.
    pub fn init_config_file(path: impl AsRef<Path>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = path.as_ref().to_path_buf();

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path));
        }

        Settings::default().save(&config_path)?;
        tracing::info!(target: "config", "wrote default configuration to {}", config_path.display());

        Ok(config_path)
    }
}

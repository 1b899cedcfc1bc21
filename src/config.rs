//! Configuration module for the document search service.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCSEEK_` and use double underscores
//! to separate nested levels:
//! - `DOCSEEK_SERVER__PORT=9000` sets `server.port`
//! - `DOCSEEK_LOADER__PDF_MAX_CHARS=50000` sets `loader.pdf_max_chars`
//! - `DOCSEEK_SEMANTIC_SEARCH__MODEL=hashing` sets `semantic_search.model`
//!
//! The bare variables `HOST`, `PORT`, `LOG_LEVEL`, `INDEX_DIR` and
//! `EMBEDDING_MODEL` are also honored and win over everything else.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file, searched upward from the current directory.
pub const CONFIG_DIR: &str = ".docseek";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the index directory
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Name of the document collection inside the index directory
    #[serde(default = "default_collection")]
    pub collection: String,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Semantic search settings
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    /// File loader settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Indexing pipeline settings
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Retrieval-augmented answer settings
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for `limit` in search requests
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum accepted request body size for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Attach a permissive CORS layer
    #[serde(default)]
    pub cors: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SemanticSearchConfig {
    /// Model to use for embeddings ("hashing" selects the offline embedder)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Hits scoring below this threshold are dropped
    #[serde(default)]
    pub threshold: f32,

    /// Show model download progress on first use
    #[serde(default)]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoaderConfig {
    /// Extensions picked up when indexing a directory
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// PDF text beyond this many characters is dropped
    #[serde(default = "default_pdf_max_chars")]
    pub pdf_max_chars: usize,

    /// Rows read per spreadsheet sheet
    #[serde(default = "default_excel_max_rows")]
    pub excel_max_rows: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of parallel threads for loading files
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Documents committed per transaction when indexing a directory
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Show progress bars in the CLI
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnswerConfig {
    /// Characters of each source document placed in the prompt
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
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
fn default_index_path() -> PathBuf {
    PathBuf::from(".docseek/index")
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_max_results() -> usize {
    100
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_extensions() -> Vec<String> {
    [".txt", ".pdf", ".docx", ".xlsx", ".xls", ".pptx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_pdf_max_chars() -> usize {
    1_000_000
}
fn default_excel_max_rows() -> usize {
    1000
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    64
}
fn default_true() -> bool {
    true
}
fn default_max_context_chars() -> usize {
    4000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            collection: default_collection(),
            server: ServerConfig::default(),
            semantic_search: SemanticSearchConfig::default(),
            loader: LoaderConfig::default(),
            indexing: IndexingConfig::default(),
            answer: AnswerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_results: default_max_results(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: false,
        }
    }
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            threshold: 0.0,
            show_download_progress: false,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            pdf_max_chars: default_pdf_max_chars(),
            excel_max_rows: default_excel_max_rows(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            batch_size: default_batch_size(),
            show_progress: true,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
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

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration layering a specific file under env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels, single underscore stays in field names
            .merge(Env::prefixed("DOCSEEK_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            // Bare variables understood by earlier deployments of the service
            .merge(
                Env::raw()
                    .only(&["HOST", "PORT", "LOG_LEVEL", "INDEX_DIR", "EMBEDDING_MODEL"])
                    .map(|key| legacy_key(key.as_str()).into()),
            )
    }

    /// Find the settings file by looking for a `.docseek` directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Directory of the active collection.
    pub fn collection_path(&self) -> PathBuf {
        self.index_path.join(&self.collection)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

/// Where settings were read from, before environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// An existing settings file.
    File(PathBuf),
    /// No settings file; built-in defaults.
    Defaults,
}

impl ConfigSource {
    /// The `--config` path when given, otherwise the workspace settings file.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Settings::find_workspace_config(),
        };
        match path {
            Some(path) if path.is_file() => ConfigSource::File(path),
            _ => ConfigSource::Defaults,
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults (no settings file found)"),
        }
    }
}

fn legacy_key(key: &str) -> String {
    match key.to_ascii_uppercase().as_str() {
        "HOST" => "server.host".to_string(),
        "PORT" => "server.port".to_string(),
        "LOG_LEVEL" => "logging.default".to_string(),
        "INDEX_DIR" => "index_path".to_string(),
        "EMBEDDING_MODEL" => "semantic_search.model".to_string(),
        other => other.to_lowercase(),
    }
}

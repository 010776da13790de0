use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub data: DataConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector_store: VectorStoreConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// Watched documents folder and ledger location
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Root directory containing the documents to index.
    pub root: PathBuf,
    /// Where the set of already-processed file paths is persisted.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

/// Embedding provider configuration (HuggingFace inference API)
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    pub dimension: usize,
}

/// Vector store configuration (Pinecone serverless REST API)
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    pub index_name: String,
    pub api_key_env: String,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    /// Hard deadline for a freshly created index to become ready.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

/// Chat completion model configuration (Gemini generateContent API)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub model: String,
    pub api_key_env: String,
}

/// Retrieval tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

/// Chunker parameters, in bytes (cuts are clamped to UTF-8 char boundaries)
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Filesystem watcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last change event before a re-scan runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("processed_files.json")
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_ready_timeout_secs() -> u64 {
    120
}

fn default_top_k() -> usize {
    4
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_debounce_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RAGSERVE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RAGSERVE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.data.root.exists() {
            anyhow::bail!(
                "data.root path does not exist: {}. Set data.root in config.toml to your documents directory.",
                self.data.root.display()
            );
        }

        if !self.data.root.is_dir() {
            anyhow::bail!(
                "data.root must be a directory, not a file: {}",
                self.data.root.display()
            );
        }

        // API keys are required at startup; missing credentials are fatal.
        for key_env in [
            &self.embeddings.api_key_env,
            &self.vector_store.api_key_env,
            &self.chat.api_key_env,
        ] {
            std::env::var(key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    key_env
                )
            })?;
        }

        if self.embeddings.dimension == 0 {
            anyhow::bail!("embeddings.dimension must be greater than 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be greater than 0");
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap must be less than chunk_size");
        }

        if self.vector_store.upsert_batch_size == 0 {
            anyhow::bail!("vector_store.upsert_batch_size must be greater than 0");
        }

        Ok(())
    }

    /// Get the watched documents root
    pub fn data_root(&self) -> &Path {
        &self.data.root
    }

    /// Get the ledger persistence path
    pub fn ledger_path(&self) -> &Path {
        &self.data.ledger_path
    }
}

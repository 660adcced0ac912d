//! TOML configuration parsing and validation.
//!
//! Every section has documented defaults, so an empty file (or no file at
//! all, see [`load_or_default`]) yields a working configuration:
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "./data/vector_index"
//!
//! [extraction]
//! mode = "auto"
//! min_text_length = 100
//! ocr_dpi = 300
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [retrieval]
//! top_k = 5
//! max_context_chunks = 3
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Which [`VectorIndex`](crate::store::VectorIndex) implementation to build.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Disk-backed SQLite store, used in normal operation.
    Sqlite,
    /// In-process matrix rewritten to a flat snapshot on every mutation.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Persistence directory shared by both backends.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/vector_index")
}

/// How the extraction engine decides between the text layer and OCR.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Whole-document text extraction, OCR fallback when the yield is low.
    Auto,
    /// Per-page decision: OCR only the pages whose text yield is low.
    Hybrid,
    /// Never run OCR.
    TextOnly,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_mode")]
    pub mode: ExtractionMode,
    /// Below this many characters a document (or page, in hybrid mode) is
    /// treated as scanned.
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
    #[serde(default = "default_pdftoppm_bin")]
    pub pdftoppm_bin: String,
    /// Caller-imposed extraction timeout; 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            min_text_length: default_min_text_length(),
            ocr_dpi: default_ocr_dpi(),
            ocr_enabled: true,
            ocr_language: default_ocr_language(),
            tesseract_bin: default_tesseract_bin(),
            pdftoppm_bin: default_pdftoppm_bin(),
            timeout_secs: 0,
        }
    }
}

fn default_mode() -> ExtractionMode {
    ExtractionMode::Auto
}
fn default_min_text_length() -> usize {
    100
}
fn default_ocr_dpi() -> u32 {
    300
}
fn default_true() -> bool {
    true
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}
fn default_pdftoppm_bin() -> String {
    "pdftoppm".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> Option<String> {
    Some("all-minilm-l6-v2".to_string())
}
fn default_dims() -> Option<usize> {
    Some(384)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chunks: default_max_context_chunks(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_context_chunks() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Load `path` if it exists, otherwise fall back to built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(
            "Config file {} not found, using defaults",
            path.display()
        );
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    // Validate extraction
    if !(72..=1200).contains(&config.extraction.ocr_dpi) {
        anyhow::bail!("extraction.ocr_dpi must be in [72, 1200]");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_context_chunks < 1 {
        anyhow::bail!("retrieval.max_context_chunks must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" | "hash" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, hash, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() && config.embedding.dims == Some(0) {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() {
            anyhow::bail!(
                "embedding.dims must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(())
}

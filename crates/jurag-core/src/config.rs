//! Persisted config (corpus dir, index path, chunking, models) in the app data directory,
//! and the validated settings the pipeline runs with.
//!
//! Secrets never live here: the LLM API key comes from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_PDF_DIR: &str = "data";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 150;
pub const DEFAULT_TOP_K: usize = 4;
/// Upper bound on retrieved text stuffed into one prompt.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the PDF corpus.
    pub pdf_dir: String,
    /// Where the index is persisted. Empty means `<app data>/docs_index`.
    pub index_path: Option<String>,
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pdf_dir: DEFAULT_PDF_DIR.to_string(),
            index_path: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: crate::ollama::DEFAULT_EMBED_MODEL.to_string(),
            dimensions: crate::ollama::DEFAULT_EMBED_DIMENSIONS,
            base_url: crate::ollama::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Which service answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    /// Overrides the provider's default endpoint when set.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            model: crate::llm::DEFAULT_GROQ_MODEL.to_string(),
            base_url: None,
        }
    }
}

impl Config {
    /// Resolved pipeline settings (paths made concrete). Not validated yet.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let index_path = self
            .index_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(app_data::default_index_path);
        PipelineSettings {
            pdf_dir: PathBuf::from(&self.pdf_dir),
            index_path,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            top_k: self.top_k,
            max_context_chars: self.max_context_chars,
        }
    }
}

/// Everything `Pipeline::initialize` and `Pipeline::ask` need besides the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub pdf_dir: PathBuf,
    pub index_path: PathBuf,
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl PipelineSettings {
    /// Settings with the default chunking and retrieval parameters.
    pub fn new(pdf_dir: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
            index_path: index_path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chunking(self.chunk_size, self.overlap)?;
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.max_context_chars == 0 {
            return Err(ConfigError::InvalidContextBudget);
        }
        Ok(())
    }
}

/// `chunk_size > 0` and `overlap < chunk_size`.
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize);
    }
    if overlap >= chunk_size {
        return Err(ConfigError::OverlapTooLarge {
            overlap,
            chunk_size,
        });
    }
    Ok(())
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    load_config_from(&data_dir.join(CONFIG_FILENAME))
}

/// Load config from an explicit file. Missing or invalid files yield the defaults.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            Config::default()
        }
    }
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    let path = data_dir.join(CONFIG_FILENAME);
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(&path, s).map_err(ConfigError::Write)
}

/// Set and persist the PDF corpus directory.
pub fn set_pdf_dir(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.pdf_dir = path.to_string_lossy().into_owned();
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than 0")]
    InvalidChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
    #[error("top_k must be at least 1")]
    InvalidTopK,
    #[error("max_context_chars must be greater than 0")]
    InvalidContextBudget,
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.voyageai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "voyage-law-2";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "dev_docs";

/// Environment variable holding the embedding service API key.
pub const EMBEDDING_API_KEY_ENV: &str = "KB_EMBEDDING_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kbase").join("config.toml"))
    }

    /// Path of the progress ledger for the configured destination. One
    /// ledger exists per collection so resume state follows the knowledge
    /// base, not the process.
    pub fn ledger_path(&self) -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| {
            p.join("kbase")
                .join(format!("{}.progress.db", self.vector_store.collection))
        })
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.pipeline.batch_size == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "pipeline.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.pipeline.backoff_base_seconds < 0.0 || self.pipeline.rpm_delay_seconds < 0.0 {
            return Err(crate::error::ConfigError::ValidationError(
                "pipeline delays must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    1024
}

fn default_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Knobs for the batch-embedding pipeline. Threaded explicitly into the
/// driver and embedder; nothing reads these from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_rpm_delay")]
    pub rpm_delay_seconds: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_seconds: f64,

    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_seconds: f64,
}

fn default_batch_size() -> u32 {
    8
}

fn default_rpm_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base() -> f64 {
    30.0
}

fn default_backoff_cap() -> f64 {
    300.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            rpm_delay_seconds: default_rpm_delay(),
            max_retries: default_max_retries(),
            backoff_base_seconds: default_backoff_base(),
            backoff_cap_seconds: default_backoff_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/.venv/**".to_string(),
        "**/vendor/**".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
        }
    }
}

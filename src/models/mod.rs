mod chunk;
mod config;
mod report;

pub use chunk::{Chunk, EmbeddedChunk, EmbeddingResult, SourceRef};
pub use config::{
    Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_QDRANT_URL,
    EMBEDDING_API_KEY_ENV, EmbeddingConfig, IndexingConfig, PipelineConfig, VectorStoreConfig,
};
pub use report::{BuildReport, FailedBatch, OutputFormat};

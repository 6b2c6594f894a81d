//! Vector store abstraction layer.
//!
//! The pipeline only needs a narrow surface from its vector database: health,
//! collection bootstrap, and an idempotent batch upsert. Backends implement
//! [`VectorStore`] so the driver stays agnostic of the concrete client.

mod qdrant;

pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{EmbeddedChunk, VectorStoreConfig};

/// Collection information.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, StorageError>;

    /// Get information about the current collection.
    /// Returns None if the collection doesn't exist.
    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, StorageError>;

    /// Create the collection if it doesn't exist.
    async fn create_collection(&self) -> Result<(), StorageError>;

    /// Insert or update embedded chunks, keyed by chunk id.
    ///
    /// Must be idempotent: re-writing a chunk after a partially failed run
    /// replaces the previous point rather than duplicating it.
    async fn upsert_points(&self, chunks: Vec<EmbeddedChunk>) -> Result<(), StorageError>;

    /// Delete every point from the collection.
    async fn clear_collection(&self) -> Result<(), StorageError>;

    /// Get the collection name.
    fn collection(&self) -> &str;
}

/// Create a vector store backend based on configuration.
pub fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Box<dyn VectorStore>, StorageError> {
    let backend = QdrantBackend::new(config, embedding_dim)?;
    Ok(Box::new(backend))
}

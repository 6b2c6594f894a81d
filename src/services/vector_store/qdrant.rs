//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;

use super::{CollectionInfo, VectorStore};
use crate::error::StorageError;
use crate::models::{EmbeddedChunk, VectorStoreConfig};

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    /// Create a new Qdrant backend from configuration.
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, StorageError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, StorageError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, StorageError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(StorageError::CollectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), StorageError> {
        if self.get_collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| StorageError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<EmbeddedChunk>) -> Result<(), StorageError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|embedded| {
                let chunk = embedded.chunk;
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("text".to_string(), chunk.text.into());
                payload.insert("path".to_string(), chunk.source.path.into());
                payload.insert("filename".to_string(), chunk.source.filename.into());
                if let Some(section) = chunk.source.section {
                    payload.insert("section".to_string(), section.into());
                }

                PointStruct::new(chunk.id, embedded.vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| StorageError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn clear_collection(&self) -> Result<(), StorageError> {
        let delete = DeletePointsBuilder::new(&self.collection).points(Filter::default());

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| StorageError::ClientError(e.to_string()))?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

mod batcher;
mod chunker;
mod embedder;
mod embedding;
mod ledger;
mod pipeline;
mod vector_store;

pub use batcher::make_batches;
pub use chunker::{ChunkSource, DirectorySource, MarkdownChunker};
pub use embedder::RetryingEmbedder;
pub use embedding::{EmbeddingService, HttpEmbeddingClient};
pub use ledger::ProgressLedger;
pub use pipeline::PipelineDriver;
pub use vector_store::{CollectionInfo, QdrantBackend, VectorStore, create_backend};

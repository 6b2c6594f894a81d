//! Chunk models: the atomic units the pipeline embeds and stores.

use serde::{Deserialize, Serialize};

/// Where a chunk came from within the source corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Absolute path of the originating file.
    pub path: String,

    /// File name, for display and citations.
    pub filename: String,

    /// Section heading or page label, when the format provides one.
    pub section: Option<String>,
}

impl SourceRef {
    /// Create a source reference for a file.
    pub fn new(path: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            section: None,
        }
    }

    /// Attach a section label.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// A unit of source text with stable identity.
///
/// Identity is derived from the source path and the chunk's position within
/// the document, so re-chunking the same input yields the same ids and the
/// progress ledger can match chunks across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source: SourceRef,
}

impl Chunk {
    /// Derive the document id for a source path.
    pub fn document_id(path: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(path.as_bytes());
        hex::encode(&hash[..16])
    }

    /// Derive a stable chunk id from a document id and chunk position.
    pub fn generate_id(document_id: &str, index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Create a chunk at the given position within its source document.
    pub fn new(text: String, source: SourceRef, index: u32) -> Self {
        let id = Self::generate_id(&Self::document_id(&source.path), index);
        Self { id, text, source }
    }
}

/// One embedded chunk as returned by the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub model_id: String,
}

/// A chunk paired with its vector, ready for the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

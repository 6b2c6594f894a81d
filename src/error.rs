//! Error types for the knowledge-base builder.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::utils::retry::Retryable;

/// Classification of a batch failure, recorded in the build report and the
/// progress ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Transient,
    Permanent,
    Protocol,
    RetriesExhausted,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate_limited"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::RetriesExhausted => write!(f, "retries_exhausted"),
            ErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// Errors from the embedding service.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient service error: {0}")]
    Transient(String),

    #[error("permanent service error: {0}")]
    Permanent(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl EmbedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbedError::RateLimited(_) => ErrorKind::RateLimited,
            EmbedError::Transient(_) => ErrorKind::Transient,
            EmbedError::Permanent(_) => ErrorKind::Permanent,
            EmbedError::Protocol(_) => ErrorKind::Protocol,
            EmbedError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }
}

impl Retryable for EmbedError {
    fn is_retryable(&self) -> bool {
        matches!(self, EmbedError::RateLimited(_) | EmbedError::Transient(_))
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("vector store client error: {0}")]
    ClientError(String),
}

/// Errors from the progress ledger. Fatal to a build: without durable
/// progress tracking, completed work cannot be told apart from pending work.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another build holds the ledger (lock file: {0})")]
    Locked(String),

    #[error("could not determine ledger path")]
    NoPath,
}

/// Errors related to reading and chunking source documents.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file read error: {0}")]
    FileReadError(String),

    #[error("directory walk error: {0}")]
    WalkError(String),

    #[error("no documents found")]
    NoDocuments,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Fatal build errors. Per-batch embedding and storage failures are not
/// represented here; they land in the build report instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("vector store error: {0}")]
    Storage(#[from] StorageError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_error_retryable() {
        assert!(EmbedError::RateLimited("429".into()).is_retryable());
        assert!(EmbedError::Transient("503".into()).is_retryable());
        assert!(!EmbedError::Permanent("401".into()).is_retryable());
        assert!(!EmbedError::Protocol("count mismatch".into()).is_retryable());
        assert!(
            !EmbedError::RetriesExhausted {
                attempts: 6,
                last_error: "429".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::RateLimited.to_string(), "rate_limited");
        assert_eq!(ErrorKind::RetriesExhausted.to_string(), "retries_exhausted");
        assert_eq!(ErrorKind::Storage.to_string(), "storage");
    }

    #[test]
    fn test_embed_error_kind() {
        assert_eq!(
            EmbedError::Transient("timeout".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            EmbedError::RetriesExhausted {
                attempts: 6,
                last_error: "503".into()
            }
            .kind(),
            ErrorKind::RetriesExhausted
        );
    }
}

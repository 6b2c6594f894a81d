//! Retrying wrapper around the embedding service.

use tracing::warn;

use crate::error::EmbedError;
use crate::models::{Chunk, EmbeddingResult};
use crate::services::EmbeddingService;
use crate::utils::retry::{RetryPolicy, RetryResult, Retryable, with_retry};

/// Embeds batches through an [`EmbeddingService`], retrying rate-limit and
/// transient failures with bounded exponential backoff. Permanent and
/// protocol failures surface immediately.
pub struct RetryingEmbedder<'a> {
    service: &'a dyn EmbeddingService,
    policy: RetryPolicy,
}

impl<'a> RetryingEmbedder<'a> {
    pub fn new(service: &'a dyn EmbeddingService, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Embed one batch, returning one result per chunk in batch order.
    pub async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<EmbeddingResult>, EmbedError> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let outcome = with_retry(&self.policy, || async {
            self.service.embed(&texts).await
        })
        .await;

        let vectors = match outcome {
            RetryResult::Success(vectors) => vectors,
            RetryResult::Failed {
                last_error,
                attempts,
            } => {
                if last_error.is_retryable() {
                    warn!(attempts, error = %last_error, "giving up on batch");
                    return Err(EmbedError::RetriesExhausted {
                        attempts,
                        last_error: last_error.to_string(),
                    });
                }
                return Err(last_error);
            }
        };

        validate_alignment(batch, &vectors)?;

        let model_id = self.service.model_id();
        Ok(batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingResult {
                chunk_id: chunk.id.clone(),
                vector,
                model_id: model_id.to_string(),
            })
            .collect())
    }
}

/// The response must carry exactly one vector per input, all of the same
/// dimension. Anything else risks attaching a vector to the wrong chunk, so
/// it is rejected rather than retried.
fn validate_alignment(batch: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
    if vectors.len() != batch.len() {
        return Err(EmbedError::Protocol(format!(
            "expected {} vectors, got {}",
            batch.len(),
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(EmbedError::Protocol("empty vector in response".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(EmbedError::Protocol(format!(
                "inconsistent vector dimensions: {} vs {}",
                first.len(),
                bad.len()
            )));
        }
    }
    Ok(())
}

//! Pipeline driver: batching, embedding, storing, and progress commits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{BuildError, EmbedError, ErrorKind, StorageError};
use crate::models::{BuildReport, Chunk, EmbeddedChunk, FailedBatch, PipelineConfig};
use crate::services::batcher::make_batches;
use crate::services::embedder::RetryingEmbedder;
use crate::services::embedding::EmbeddingService;
use crate::services::ledger::ProgressLedger;
use crate::services::vector_store::VectorStore;
use crate::utils::retry::RetryPolicy;

/// Why a single batch could not be processed.
struct BatchFailure {
    kind: ErrorKind,
    message: String,
}

impl From<EmbedError> for BatchFailure {
    fn from(error: EmbedError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<StorageError> for BatchFailure {
    fn from(error: StorageError) -> Self {
        Self {
            kind: ErrorKind::Storage,
            message: error.to_string(),
        }
    }
}

/// Coordinates the whole embedding run: filters already-completed chunks,
/// forms batches, embeds each through the retrying embedder, writes vectors
/// to the store, and commits progress to the ledger — one batch at a time,
/// in chunk order.
///
/// A batch that fails terminally is recorded in the report and the run moves
/// on; only ledger failures abort the run. Progress for a batch is committed
/// strictly after its vectors are stored.
pub struct PipelineDriver<'a> {
    embedder: RetryingEmbedder<'a>,
    store: &'a dyn VectorStore,
    ledger: &'a mut ProgressLedger,
    batch_size: usize,
    rpm_delay: Duration,
    cancel: Arc<AtomicBool>,
    progress: Option<Box<dyn FnMut(usize, usize) + 'a>>,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(
        service: &'a dyn EmbeddingService,
        store: &'a dyn VectorStore,
        ledger: &'a mut ProgressLedger,
        config: &PipelineConfig,
    ) -> Self {
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs_f64(config.backoff_base_seconds.max(0.0)),
            max_delay: Duration::from_secs_f64(config.backoff_cap_seconds.max(0.0)),
        };

        Self {
            embedder: RetryingEmbedder::new(service, policy),
            store,
            ledger,
            batch_size: config.batch_size.max(1) as usize,
            rpm_delay: Duration::from_secs_f64(config.rpm_delay_seconds.max(0.0)),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Register a callback invoked after each batch with
    /// `(finished_batches, total_batches)`.
    #[must_use]
    pub fn with_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Handle for requesting cooperative cancellation. Honored at batch
    /// boundaries only; an in-flight batch finishes its ledger commit first.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the pipeline over the given chunks.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let mut report = BuildReport::default();

        let total = chunks.len();
        let pending: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| {
                let done = self.ledger.is_complete(&chunk.id);
                if done {
                    report.skipped_count += 1;
                }
                !done
            })
            .collect();

        info!(
            total,
            pending = pending.len(),
            skipped = report.skipped_count,
            "starting build"
        );

        let batches: Vec<&[Chunk]> = make_batches(&pending, self.batch_size).collect();
        let total_batches = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                warn!(finished_batches = index, "build cancelled");
                report.cancelled = true;
                break;
            }

            // Rate shaping between batches, additive to any retry backoff.
            if index > 0 && !self.rpm_delay.is_zero() {
                tokio::time::sleep(self.rpm_delay).await;
            }

            let chunk_ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();

            match self.process_batch(batch).await {
                Ok(()) => {
                    // The vectors are durably stored; only now does the
                    // ledger learn about them.
                    self.ledger.mark_completed(&chunk_ids)?;
                    report.embedded_count += batch.len() as u64;
                    info!(
                        batch = index + 1,
                        of = total_batches,
                        chunks = batch.len(),
                        "batch stored"
                    );
                }
                Err(failure) => {
                    warn!(
                        batch = index + 1,
                        of = total_batches,
                        kind = %failure.kind,
                        error = %failure.message,
                        "batch failed terminally"
                    );
                    self.ledger.mark_failed(&chunk_ids, failure.kind)?;
                    report.failed_batches.push(FailedBatch {
                        batch_index: index,
                        chunk_ids,
                        error_kind: failure.kind,
                        error: failure.message,
                    });
                }
            }

            if let Some(callback) = self.progress.as_mut() {
                callback(index + 1, total_batches);
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            embedded = report.embedded_count,
            skipped = report.skipped_count,
            failed_batches = report.failed_batches.len(),
            cancelled = report.cancelled,
            "build finished"
        );
        Ok(report)
    }

    async fn process_batch(&self, batch: &[Chunk]) -> Result<(), BatchFailure> {
        let results = self.embedder.embed_batch(batch).await?;

        let points: Vec<EmbeddedChunk> = batch
            .iter()
            .cloned()
            .zip(results)
            .map(|(chunk, result)| EmbeddedChunk {
                chunk,
                vector: result.vector,
            })
            .collect();

        self.store.upsert_points(points).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRef;
    use crate::services::vector_store::CollectionInfo;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;
    use tempfile::tempdir;

    /// Embedding service that fails when a chunk text contains a marker.
    struct MarkerService {
        calls: AtomicU32,
        fail_marker: Option<String>,
        error: fn(&str) -> EmbedError,
    }

    impl MarkerService {
        fn ok() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_marker: None,
                error: |m| EmbedError::Permanent(m.to_string()),
            }
        }

        fn failing_on(marker: &str, error: fn(&str) -> EmbedError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_marker: Some(marker.to_string()),
                error,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingService for MarkerService {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref marker) = self.fail_marker
                && texts.iter().any(|t| t.contains(marker.as_str()))
            {
                return Err((self.error)(marker));
            }
            Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
        }

        fn model_id(&self) -> &str {
            "test-model"
        }
    }

    /// In-memory vector store recording upserts in arrival order.
    #[derive(Default)]
    struct MemoryStore {
        points: Mutex<Vec<String>>,
        fail_markers: Mutex<HashSet<String>>,
    }

    impl MemoryStore {
        fn failing_on(marker: &str) -> Self {
            let store = Self::default();
            store.fail_markers.lock().unwrap().insert(marker.to_string());
            store
        }

        fn stored_ids(&self) -> Vec<String> {
            self.points.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn health_check(&self) -> Result<bool, StorageError> {
            Ok(true)
        }

        async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, StorageError> {
            Ok(Some(CollectionInfo {
                points_count: self.points.lock().unwrap().len() as u64,
            }))
        }

        async fn create_collection(&self) -> Result<(), StorageError> {
            Ok(())
        }

        async fn upsert_points(&self, chunks: Vec<EmbeddedChunk>) -> Result<(), StorageError> {
            let markers = self.fail_markers.lock().unwrap();
            if chunks
                .iter()
                .any(|c| markers.iter().any(|m| c.chunk.text.contains(m.as_str())))
            {
                return Err(StorageError::UpsertError("write rejected".to_string()));
            }
            drop(markers);

            let mut points = self.points.lock().unwrap();
            for chunk in chunks {
                points.retain(|id| *id != chunk.chunk.id);
                points.push(chunk.chunk.id);
            }
            Ok(())
        }

        async fn clear_collection(&self) -> Result<(), StorageError> {
            self.points.lock().unwrap().clear();
            Ok(())
        }

        fn collection(&self) -> &str {
            "test"
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                Chunk::new(
                    format!("chunk {i}"),
                    SourceRef::new("/docs/a.md", "a.md"),
                    i as u32,
                )
            })
            .collect()
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            batch_size: 2,
            rpm_delay_seconds: 0.0,
            max_retries: 2,
            backoff_base_seconds: 0.001,
            backoff_cap_seconds: 0.002,
        }
    }

    fn ledger_in(dir: &tempfile::TempDir) -> ProgressLedger {
        ProgressLedger::open(&dir.path().join("progress.db")).unwrap()
    }

    #[tokio::test]
    async fn test_full_run_stores_everything_in_order() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let service = MarkerService::ok();
        let store = MemoryStore::default();

        let input = chunks(5);
        let expected_ids: Vec<String> = input.iter().map(|c| c.id.clone()).collect();

        let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();
        drop(driver);

        assert_eq!(report.embedded_count, 5);
        assert_eq!(report.skipped_count, 0);
        assert!(report.is_clean());
        // 5 chunks at batch_size 2 -> 3 calls.
        assert_eq!(service.call_count(), 3);
        assert_eq!(store.stored_ids(), expected_ids);
        for id in &expected_ids {
            assert!(ledger.is_complete(id));
        }
    }

    #[tokio::test]
    async fn test_second_run_makes_no_embedding_calls() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let store = MemoryStore::default();
        let input = chunks(6);

        let first_service = MarkerService::ok();
        let mut driver = PipelineDriver::new(&first_service, &store, &mut ledger, &fast_config());
        driver.build(input.clone()).await.unwrap();
        drop(driver);
        assert!(first_service.call_count() > 0);

        let second_service = MarkerService::ok();
        let mut driver = PipelineDriver::new(&second_service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();

        assert_eq!(second_service.call_count(), 0);
        assert_eq!(report.embedded_count, 0);
        assert_eq!(report.skipped_count, 6);
    }

    #[tokio::test]
    async fn test_resume_survives_process_restart() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::default();
        let input = chunks(4);

        {
            let mut ledger = ledger_in(&dir);
            let service = MarkerService::ok();
            let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
            driver.build(input.clone()).await.unwrap();
        }

        // Fresh ledger instance over the same database.
        let mut ledger = ledger_in(&dir);
        let service = MarkerService::ok();
        let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();

        assert_eq!(service.call_count(), 0);
        assert_eq!(report.skipped_count, 4);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_ledger_entry() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let service = MarkerService::ok();
        let store = MemoryStore::failing_on("chunk");

        let input = chunks(3);
        let ids: Vec<String> = input.iter().map(|c| c.id.clone()).collect();

        let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();
        drop(driver);

        assert_eq!(report.embedded_count, 0);
        assert_eq!(report.failed_batches.len(), 2);
        for batch in &report.failed_batches {
            assert_eq!(batch.error_kind, ErrorKind::Storage);
        }
        for id in &ids {
            assert!(!ledger.is_complete(id));
        }
        assert!(store.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn test_bad_batch_does_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        // Batches of 2 over 6 chunks: "chunk 2"/"chunk 3" form batch 2.
        let service =
            MarkerService::failing_on("chunk 2", |m| EmbedError::Permanent(m.to_string()));
        let store = MemoryStore::default();

        let input = chunks(6);
        let ids: Vec<String> = input.iter().map(|c| c.id.clone()).collect();

        let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();
        drop(driver);

        assert_eq!(report.embedded_count, 4);
        assert_eq!(report.failed_batches.len(), 1);
        let failed = &report.failed_batches[0];
        assert_eq!(failed.batch_index, 1);
        assert_eq!(failed.chunk_ids, vec![ids[2].clone(), ids[3].clone()]);
        assert_eq!(failed.error_kind, ErrorKind::Permanent);

        assert!(ledger.is_complete(&ids[0]));
        assert!(ledger.is_complete(&ids[5]));
        assert!(!ledger.is_complete(&ids[2]));
        assert!(!ledger.is_complete(&ids[3]));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_marks_batch_failed() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let service = MarkerService::failing_on("chunk", |m| EmbedError::RateLimited(m.to_string()));
        let store = MemoryStore::default();

        let input = chunks(2);
        let ids: Vec<String> = input.iter().map(|c| c.id.clone()).collect();

        let mut driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let report = driver.build(input).await.unwrap();
        drop(driver);

        // Initial attempt plus max_retries retries for the single batch.
        assert_eq!(service.call_count(), 3);
        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(
            report.failed_batches[0].error_kind,
            ErrorKind::RetriesExhausted
        );
        for id in &ids {
            assert!(!ledger.is_complete(id));
        }
    }

    #[tokio::test]
    async fn test_failed_chunks_retry_on_next_run() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let store = MemoryStore::default();
        let input = chunks(4);

        let flaky = MarkerService::failing_on("chunk 3", |m| EmbedError::Permanent(m.to_string()));
        let mut driver = PipelineDriver::new(&flaky, &store, &mut ledger, &fast_config());
        let report = driver.build(input.clone()).await.unwrap();
        drop(driver);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(report.failed_batches.len(), 1);

        let healthy = MarkerService::ok();
        let mut driver = PipelineDriver::new(&healthy, &store, &mut ledger, &fast_config());
        let report = driver.build(input.clone()).await.unwrap();
        drop(driver);

        // Only the previously failed batch is reprocessed.
        assert_eq!(report.skipped_count, 2);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(healthy.call_count(), 1);
        for chunk in &input {
            assert!(ledger.is_complete(&chunk.id));
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_batches() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let service = MarkerService::ok();
        let store = MemoryStore::default();
        let input = chunks(6);

        let driver = PipelineDriver::new(&service, &store, &mut ledger, &fast_config());
        let cancel = driver.cancel_handle();
        let mut driver = driver.with_progress(move |done, _total| {
            // Request cancellation once the first batch has committed.
            if done == 1 {
                cancel.store(true, Ordering::SeqCst);
            }
        });
        let report = driver.build(input).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(store.stored_ids().len(), 2);
        assert_eq!(service.call_count(), 1);
    }
}

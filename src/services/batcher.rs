//! Order-preserving batch grouping.

use crate::models::Chunk;

/// Group chunks into batches of at most `batch_size`, preserving order.
///
/// Produces `ceil(n / batch_size)` batches; every batch is full except
/// possibly the last. A `batch_size` of zero is treated as one.
pub fn make_batches(chunks: &[Chunk], batch_size: usize) -> impl Iterator<Item = &[Chunk]> + '_ {
    chunks.chunks(batch_size.max(1))
}

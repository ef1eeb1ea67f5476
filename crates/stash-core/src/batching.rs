//! Deterministic chunking of write sets under the store's per-commit cap.

use tracing::{error, info};

use crate::{BatchWrite, CoreError, CoreResult, LedgerStore};

/// Splits `items` into consecutive groups of at most `size` elements, keeping order.
pub fn chunked<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Commits `writes` in order, `chunk_size` at a time (clamped to the store's limit).
///
/// Every chunk is attempted. Returns the number of committed writes, or
/// [`CoreError::PartialCommit`] naming each chunk that failed.
pub async fn commit_in_chunks(
    store: &dyn LedgerStore,
    writes: Vec<BatchWrite>,
    chunk_size: usize,
) -> CoreResult<usize> {
    if writes.is_empty() {
        return Ok(0);
    }
    let limit = chunk_size.min(store.max_batch_writes()).max(1);
    let chunks = chunked(writes, limit);
    let total_chunks = chunks.len();
    let mut committed = 0;
    let mut failed_chunks = Vec::new();
    let mut first_error = None;

    for (index, chunk) in chunks.into_iter().enumerate() {
        let size = chunk.len();
        match store.commit_batch(chunk).await {
            Ok(()) => committed += size,
            Err(err) => {
                error!(chunk = index, size, error = %err, "batch commit failed");
                failed_chunks.push(index);
                first_error.get_or_insert_with(|| err.to_string());
            }
        }
    }

    if let Some(first_error) = first_error {
        return Err(CoreError::PartialCommit {
            failed_chunks,
            total_chunks,
            first_error,
        });
    }
    info!(committed, chunks = total_chunks, "batch writes committed");
    Ok(committed)
}

//! The vector store capability the pipeline depends on.

use futures::future::BoxFuture;

use crate::errors::StoreError;
use crate::record::{RagFilter, RetrievalResult, StoredChunk};

/// Persists chunk vectors and answers nearest-neighbor queries.
///
/// Implementations must be safe for concurrent readers and writers. Upsert is
/// idempotent per `chunk_id` and atomic per entry; `search` returns hits in
/// descending similarity with ties broken by the smaller `chunk_id`.
pub trait VectorStore: Send + Sync {
    /// Dimension every stored vector must have.
    fn dimension(&self) -> usize;

    /// Creates the backing collection if it does not exist yet.
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Inserts or replaces entries. Returns the number of entries written.
    ///
    /// All dimensions are checked before anything is written.
    fn upsert<'a>(&'a self, entries: &'a [StoredChunk]) -> BoxFuture<'a, Result<usize, StoreError>>;

    /// Up to `top_k` nearest entries; fewer when the store holds fewer.
    ///
    /// `top_k == 0` is [`StoreError::InvalidArgument`].
    fn search<'a>(
        &'a self,
        query: &'a [f32],
        top_k: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<RetrievalResult>, StoreError>>;

    /// Removes every chunk of a document in one operation. Unknown ids are a no-op.
    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Removes the chunks of a document whose position is not in `keep`.
    ///
    /// Used after a re-ingest has overwritten positions in place, so the
    /// document never disappears between its old and new version. An empty
    /// `keep` removes the whole document.
    fn delete_stale<'a>(
        &'a self,
        document_id: &'a str,
        keep: &'a [u32],
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Removes every stored chunk.
    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Number of stored chunks.
    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>>;
}

pub(crate) fn check_top_k(top_k: usize) -> Result<(), StoreError> {
    if top_k == 0 {
        Err(StoreError::InvalidArgument("top_k must be >= 1".into()))
    } else {
        Ok(())
    }
}

pub(crate) fn check_dimensions(entries: &[StoredChunk], want: usize) -> Result<(), StoreError> {
    match entries.iter().find(|e| e.vector.len() != want) {
        Some(e) => Err(StoreError::VectorSizeMismatch {
            chunk_id: e.chunk_id.clone(),
            got: e.vector.len(),
            want,
        }),
        None => Ok(()),
    }
}

//! In-memory vector store.
//!
//! A `HashMap` keyed by `chunk_id` behind a `tokio::sync::RwLock`: concurrent
//! searches share the read lock, upserts and deletes take the write lock for
//! the whole batch, so readers never observe half of a document delete.
//! Suitable for tests, local runs and small corpora.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::DistanceKind;
use crate::errors::StoreError;
use crate::filters;
use crate::record::{RagFilter, RetrievalResult, StoredChunk, rank_results};
use crate::similarity;
use crate::store::{VectorStore, check_dimensions, check_top_k};

#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    distance: DistanceKind,
    chunks: RwLock<HashMap<String, StoredChunk>>,
}

impl InMemoryVectorStore {
    /// Cosine store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self::with_distance(dimension, DistanceKind::Cosine)
    }

    pub fn with_distance(dimension: usize, distance: DistanceKind) -> Self {
        Self {
            dimension,
            distance,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of one entry, mostly for assertions.
    pub async fn get(&self, chunk_id: &str) -> Option<StoredChunk> {
        self.chunks.read().await.get(chunk_id).cloned()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn upsert<'a>(&'a self, entries: &'a [StoredChunk]) -> BoxFuture<'a, Result<usize, StoreError>> {
        Box::pin(async move {
            check_dimensions(entries, self.dimension)?;
            let mut map = self.chunks.write().await;
            for e in entries {
                map.insert(e.chunk_id.clone(), e.clone());
            }
            debug!(written = entries.len(), total = map.len(), "in-memory upsert");
            Ok(entries.len())
        })
    }

    fn search<'a>(
        &'a self,
        query: &'a [f32],
        top_k: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<RetrievalResult>, StoreError>> {
        Box::pin(async move {
            check_top_k(top_k)?;
            if query.len() != self.dimension {
                return Err(StoreError::VectorSizeMismatch {
                    chunk_id: "<query>".into(),
                    got: query.len(),
                    want: self.dimension,
                });
            }

            let map = self.chunks.read().await;
            let mut hits: Vec<RetrievalResult> = map
                .values()
                .filter(|c| filter.is_none_or(|f| filters::matches(f, c)))
                .map(|c| RetrievalResult {
                    chunk_id: c.chunk_id.clone(),
                    document_id: c.document_id.clone(),
                    position: c.position,
                    similarity_score: similarity::score(self.distance, query, &c.vector),
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                })
                .collect();
            drop(map);

            rank_results(&mut hits);
            hits.truncate(top_k);
            Ok(hits)
        })
    }

    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut map = self.chunks.write().await;
            let before = map.len();
            map.retain(|_, c| c.document_id != document_id);
            debug!(document_id, removed = before - map.len(), "in-memory delete_document");
            Ok(())
        })
    }

    fn delete_stale<'a>(
        &'a self,
        document_id: &'a str,
        keep: &'a [u32],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut map = self.chunks.write().await;
            let before = map.len();
            map.retain(|_, c| c.document_id != document_id || keep.contains(&c.position));
            debug!(document_id, removed = before - map.len(), "in-memory delete_stale");
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.chunks.write().await.clear();
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move { Ok(self.chunks.read().await.len() as u64) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(doc: &str, pos: u32, vector: Vec<f32>) -> StoredChunk {
        StoredChunk {
            chunk_id: format!("{doc}#{pos}"),
            document_id: doc.into(),
            position: pos,
            text: format!("{doc} chunk {pos}"),
            vector,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = InMemoryVectorStore::new(2);
        let e = entry("a", 0, vec![1.0, 0.0]);
        store.upsert(std::slice::from_ref(&e)).await.unwrap();
        store.upsert(std::slice::from_ref(&e)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let mut replaced = entry("a", 0, vec![0.0, 1.0]);
        replaced.text = "new text".into();
        store.upsert(&[replaced]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let current = store.get("a#0").await.unwrap();
        assert_eq!(current.text, "new text");
        assert_eq!(current.vector, vec![0.0, 1.0]);

        // Search sees the new vector, not the old one.
        let hit = &store.search(&[0.0, 1.0], 1, None).await.unwrap()[0];
        assert!((hit.similarity_score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn delete_stale_keeps_listed_positions() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                entry("a", 0, vec![0.0, 1.0]),
                entry("a", 1, vec![1.0, 0.0]),
                entry("a", 2, vec![1.0, 1.0]),
                entry("b", 2, vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        store.delete_stale("a", &[0, 1]).await.unwrap();
        assert!(store.get("a#2").await.is_none());
        assert!(store.get("a#0").await.is_some());
        assert!(store.get("b#2").await.is_some());

        store.delete_stale("a", &[]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_writes_nothing() {
        let store = InMemoryVectorStore::new(2);
        let batch = [entry("a", 0, vec![1.0, 0.0]), entry("a", 1, vec![1.0])];
        let err = store.upsert(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::VectorSizeMismatch { got: 1, want: 2, .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_orders_and_limits() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                entry("a", 0, vec![0.0, 1.0]),
                entry("a", 1, vec![1.0, 0.0]),
                entry("b", 0, vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, ["a#1", "b#0"]);

        let all = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(all.len(), 3);

        assert!(matches!(
            store.search(&[1.0, 0.0], 0, None).await,
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn delete_document_cascades_and_ignores_unknown() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                entry("a", 0, vec![0.0, 1.0]),
                entry("a", 1, vec![1.0, 0.0]),
                entry("b", 0, vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        store.delete_document("a").await.unwrap();
        store.delete_document("missing").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let filtered = store
            .search(&[1.0, 0.0], 5, Some(&RagFilter::document("a")))
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }
}

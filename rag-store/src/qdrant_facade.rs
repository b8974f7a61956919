//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! All Qdrant interactions live here behind the [`VectorStore`] capability,
//! so the rest of the workspace never touches the builder API. Every call runs
//! under the configured [`RetryPolicy`](llm_service::RetryPolicy).

use std::collections::HashMap;

use futures::future::BoxFuture;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchParamsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QValue, VectorParamsBuilder, points_selector::PointsSelectorOneOf,
};
use qdrant_client::{Qdrant, QdrantError};
use tracing::{debug, info, warn};

use crate::config::{DistanceKind, StoreConfig};
use crate::errors::StoreError;
use crate::filters::{stale_positions_filter, to_qdrant_filter};
use crate::payload::{chunk_payload, hit_from_payload};
use crate::record::{RagFilter, RetrievalResult, StoredChunk, rank_results, stable_uuid};
use crate::similarity;
use crate::store::{VectorStore, check_dimensions, check_top_k};

// gRPC status codes worth retrying: DEADLINE_EXCEEDED, RESOURCE_EXHAUSTED, ABORTED, UNAVAILABLE.
const TRANSIENT_CODES: [i32; 4] = [4, 8, 10, 14];
const NOT_FOUND: i32 = 5;

/// Qdrant-backed [`VectorStore`].
pub struct QdrantStore {
    client: Qdrant,
    cfg: StoreConfig,
}

impl QdrantStore {
    /// Creates the client. No network round-trip happens here.
    pub fn new(cfg: StoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Config(format!("qdrant client: {e}")))?;

        info!(
            url = %cfg.qdrant_url,
            collection = %cfg.collection,
            dimension = cfg.space.size,
            distance = ?cfg.space.distance,
            "QdrantStore initialized"
        );
        Ok(Self { client, cfg })
    }

    pub fn collection(&self) -> &str {
        &self.cfg.collection
    }

    async fn ensure_once(&self) -> Result<(), StoreError> {
        match self.client.collection_info(&self.cfg.collection).await {
            Ok(_) => {
                debug!(collection = %self.cfg.collection, "collection already exists");
                return Ok(());
            }
            Err(err) if is_not_found(&err) => {
                warn!(collection = %self.cfg.collection, "collection not found, creating");
            }
            Err(err) => return Err(backend("collection_info", err)),
        }

        let distance = match self.cfg.space.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.cfg.collection)
                    .vectors_config(VectorParamsBuilder::new(self.cfg.space.size as u64, distance)),
            )
            .await
            .map_err(|e| backend("create_collection", e))?;

        info!(collection = %self.cfg.collection, "collection created");
        Ok(())
    }

    async fn upsert_once(&self, points: Vec<PointStruct>) -> Result<(), StoreError> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.cfg.collection, points).wait(true))
            .await
            .map_err(|e| backend("upsert_points", e))?;
        Ok(())
    }

    async fn search_once(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        let mut builder = SearchPointsBuilder::new(&self.cfg.collection, query.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        if self.cfg.exact_search {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = match self.client.search_points(builder).await {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => {
                debug!(collection = %self.cfg.collection, "search on missing collection");
                return Ok(Vec::new());
            }
            Err(e) => return Err(backend("search_points", e)),
        };

        let distance = self.cfg.space.distance;
        let mut out = Vec::with_capacity(res.result.len());
        for point in res.result {
            let score = similarity::from_backend(distance, point.score);
            match hit_from_payload(point.payload, score) {
                Some(hit) => out.push(hit),
                None => warn!("skipping point without chunk payload"),
            }
        }
        Ok(out)
    }

    async fn delete_once(&self, filter: Filter) -> Result<(), StoreError> {
        match self
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.cfg.collection)
                    .points(PointsSelectorOneOf::Filter(filter))
                    .wait(true),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(backend("delete_points", e)),
        }
    }

    async fn drop_once(&self) -> Result<(), StoreError> {
        match self.client.delete_collection(&self.cfg.collection).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(backend("delete_collection", e)),
        }
    }

    async fn count_once(&self) -> Result<u64, StoreError> {
        match self
            .client
            .count(CountPointsBuilder::new(&self.cfg.collection).exact(true))
            .await
        {
            Ok(res) => Ok(res.result.map(|r| r.count).unwrap_or(0)),
            Err(e) if is_not_found(&e) => Ok(0),
            Err(e) => Err(backend("count", e)),
        }
    }
}

impl VectorStore for QdrantStore {
    fn dimension(&self) -> usize {
        self.cfg.space.size
    }

    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.cfg
                .retry
                .run("qdrant.ensure_collection", || self.ensure_once())
                .await
                .map_err(|r| StoreError::after_retries("ensure_collection", r))
        })
    }

    fn upsert<'a>(&'a self, entries: &'a [StoredChunk]) -> BoxFuture<'a, Result<usize, StoreError>> {
        Box::pin(async move {
            if entries.is_empty() {
                return Ok(0);
            }
            check_dimensions(entries, self.cfg.space.size)?;

            let mut written = 0usize;
            for batch in entries.chunks(self.cfg.upsert_batch.max(1)) {
                let points: Vec<PointStruct> = batch.iter().map(to_point).collect();
                self.cfg
                    .retry
                    .run("qdrant.upsert", || self.upsert_once(points.clone()))
                    .await
                    .map_err(|r| StoreError::after_retries("upsert", r))?;
                written += batch.len();
                debug!(batch = batch.len(), written, "upserted points");
            }
            Ok(written)
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
            let qfilter = filter
                .filter(|f| !f.is_empty())
                .map(to_qdrant_filter)
                .transpose()?;
            let mut hits = self
                .cfg
                .retry
                .run("qdrant.search", || self.search_once(query, top_k, qfilter.clone()))
                .await
                .map_err(|r| StoreError::after_retries("search", r))?;
            // Qdrant does not promise an order among equal scores.
            rank_results(&mut hits);
            hits.truncate(top_k);
            debug!(hits = hits.len(), top_k, "search completed");
            Ok(hits)
        })
    }

    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let filter = to_qdrant_filter(&RagFilter::document(document_id))?;
            self.cfg
                .retry
                .run("qdrant.delete_document", || self.delete_once(filter.clone()))
                .await
                .map_err(|r| StoreError::after_retries("delete_document", r))?;
            info!(document_id, "deleted document chunks");
            Ok(())
        })
    }

    fn delete_stale<'a>(
        &'a self,
        document_id: &'a str,
        keep: &'a [u32],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let filter = stale_positions_filter(document_id, keep);
            self.cfg
                .retry
                .run("qdrant.delete_stale", || self.delete_once(filter.clone()))
                .await
                .map_err(|r| StoreError::after_retries("delete_stale", r))?;
            debug!(document_id, kept = keep.len(), "deleted stale document chunks");
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.cfg
                .retry
                .run("qdrant.delete_collection", || self.drop_once())
                .await
                .map_err(|r| StoreError::after_retries("delete_all", r))?;
            info!(collection = %self.cfg.collection, "collection dropped");
            self.ensure_collection().await
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            self.cfg
                .retry
                .run("qdrant.count", || self.count_once())
                .await
                .map_err(|r| StoreError::after_retries("count", r))
        })
    }
}

fn to_point(chunk: &StoredChunk) -> PointStruct {
    let payload: HashMap<String, QValue> = chunk_payload(chunk);
    PointStruct {
        id: Some(stable_uuid(&chunk.chunk_id).to_string().into()),
        payload,
        vectors: Some(chunk.vector.clone().into()),
        ..Default::default()
    }
}

fn status_code(err: &QdrantError) -> Option<i32> {
    match err {
        QdrantError::ResponseError { status, .. } => Some(status.code() as i32),
        _ => None,
    }
}

fn is_not_found(err: &QdrantError) -> bool {
    status_code(err) == Some(NOT_FOUND)
}

fn backend(operation: &'static str, err: QdrantError) -> StoreError {
    let transient = status_code(&err).is_some_and(|c| TRANSIENT_CODES.contains(&c));
    StoreError::Backend {
        operation,
        message: err.to_string(),
        transient,
    }
}

//! Query embedding plus nearest-neighbor lookup.

use std::sync::Arc;

use rag_store::{RagFilter, RetrievalResult, VectorStore};
use tracing::debug;

use crate::embedding::EmbeddingGateway;
use crate::error::{PipelineError, Stage};

pub struct Retriever {
    gateway: Arc<EmbeddingGateway>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(gateway: Arc<EmbeddingGateway>, store: Arc<dyn VectorStore>) -> Self {
        Self { gateway, store }
    }

    /// Embeds `question` and returns up to `top_k` hits at or above `threshold`.
    ///
    /// An empty result means "no relevant context", not an error.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        let vector = self.gateway.embed_query(question).await?;
        self.search(&vector, top_k, threshold, None).await
    }

    /// Lookup with an already embedded query.
    pub async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: Option<f32>,
        filter: Option<&RagFilter>,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::InvalidArgument("top_k must be >= 1".into()));
        }
        let mut hits = self
            .store
            .search(vector, top_k, filter)
            .await
            .map_err(|e| PipelineError::from_store(Stage::Retrieving, "search", e))?;

        let found = hits.len();
        if let Some(min) = threshold {
            hits.retain(|h| h.similarity_score >= min);
        }
        debug!(found, kept = hits.len(), top_k, ?threshold, "retrieved");
        Ok(hits)
    }
}

//! Embedding gateway: batching, bounded concurrency, retries and response checks
//! around an [`EmbeddingProvider`].

use std::ops::Range;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use llm_service::{LlmError, RetryPolicy};
use tracing::{debug, info};

use crate::error::{PipelineError, Stage};

/// Anything that turns an ordered batch of strings into one vector per string.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>, LlmError>>;
}

/// Result of embedding one batch of a larger input.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    /// Item range of the batch within the full input.
    pub range: Range<usize>,
    pub result: Result<Vec<Vec<f32>>, PipelineError>,
}

pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    batch_size: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl EmbeddingGateway {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        batch_size: usize,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Result<Self, PipelineError> {
        if dimension == 0 {
            return Err(PipelineError::Configuration("embedding dimension must be >= 1".into()));
        }
        if batch_size == 0 {
            return Err(PipelineError::Configuration("embedding batch size must be >= 1".into()));
        }
        if concurrency == 0 {
            return Err(PipelineError::Configuration("embedding concurrency must be >= 1".into()));
        }
        Ok(Self {
            provider,
            dimension,
            batch_size,
            concurrency,
            retry,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds `texts`; output order and count match the input.
    ///
    /// Fails with the first failing batch in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());
        for outcome in self.embed_batches(texts).await {
            out.extend(outcome.result?);
        }
        Ok(out)
    }

    /// Embeds a query as a single-item batch.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_one(0, 0..1, &input).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::contract(Stage::Embedding, "embed query", "no vector returned"))
    }

    /// Embeds every batch and reports each outcome, ordered by batch index.
    ///
    /// Batches run concurrently up to the configured limit; completion order
    /// never affects the output order.
    pub async fn embed_batches(&self, texts: &[String]) -> Vec<BatchOutcome> {
        if texts.is_empty() {
            return Vec::new();
        }
        let batches: Vec<(usize, Range<usize>)> = (0..texts.len())
            .step_by(self.batch_size)
            .enumerate()
            .map(|(i, start)| (i, start..(start + self.batch_size).min(texts.len())))
            .collect();
        info!(
            items = texts.len(),
            batches = batches.len(),
            concurrency = self.concurrency,
            "embedding"
        );

        let mut outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|(index, range)| async move {
                let result = self.embed_one(index, range.clone(), &texts[range.clone()]).await;
                BatchOutcome {
                    index,
                    range,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }

    async fn embed_one(
        &self,
        index: usize,
        range: Range<usize>,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let op = format!("embed batch {index} (items {}..{})", range.start, range.end);
        let vectors = self
            .retry
            .run(&op, || self.provider.embed_batch(inputs))
            .await
            .map_err(|r| PipelineError::from_provider(Stage::Embedding, op.clone(), r))?;

        if vectors.len() != inputs.len() {
            return Err(PipelineError::contract(
                Stage::Embedding,
                op,
                format!("expected {} vectors, got {}", inputs.len(), vectors.len()),
            ));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(PipelineError::contract(
                Stage::Embedding,
                op,
                format!(
                    "item {} has dimension {}, expected {}",
                    range.start + i,
                    v.len(),
                    self.dimension
                ),
            ));
        }
        debug!(batch = index, items = inputs.len(), "batch embedded");
        Ok(vectors)
    }
}

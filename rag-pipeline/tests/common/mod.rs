//! Test doubles for the provider capabilities.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use llm_service::{LlmError, RetryPolicy};
use rag_pipeline::{CompletionRequest, EmbeddingProvider, GenerationProvider, PipelineConfig, RagPipeline};
use rag_store::{InMemoryVectorStore, RagFilter, RetrievalResult, StoreError, StoredChunk, VectorStore};

pub const DIM: usize = 64;

/// Bag-of-words embedder: every lowercase word adds 1.0 to a hashed bucket.
pub struct FakeEmbedder {
    pub dim: usize,
    pub calls: AtomicU32,
    /// Batches containing this marker keep timing out.
    pub poison: Option<String>,
    /// Returns vectors of this length instead of `dim`.
    pub wrong_dim: Option<usize>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            dim: DIM,
            calls: AtomicU32::new(0),
            poison: None,
            wrong_dim: None,
        }
    }

    pub fn poisoned(marker: &str) -> Self {
        Self {
            poison: Some(marker.to_string()),
            ..Self::new()
        }
    }

    pub fn with_wrong_dim(len: usize) -> Self {
        Self {
            wrong_dim: Some(len),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let len = self.wrong_dim.unwrap_or(self.dim);
        let mut v = vec![0.0; len];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % len;
            v[bucket] += 1.0;
        }
        v
    }
}

impl EmbeddingProvider for FakeEmbedder {
    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>, LlmError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.poison {
                if inputs.iter().any(|s| s.contains(marker.as_str())) {
                    return Err(LlmError::Timeout(Duration::from_secs(1)));
                }
            }
            Ok(inputs.iter().map(|s| self.vector(s)).collect())
        })
    }
}

/// Replies with a fixed text and records every request.
pub struct FakeGenerator {
    pub reply: String,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl GenerationProvider for FakeGenerator {
    fn complete<'a>(&'a self, req: &'a CompletionRequest) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(req.clone());
            Ok(self.reply.clone())
        })
    }
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        chunk_size: 40,
        chunk_overlap: 8,
        embedding_dim: DIM,
        embed_batch_size: 2,
        embedding_concurrency: 2,
        max_context_chars: 200,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            ..RetryPolicy::default()
        },
        ..PipelineConfig::default()
    }
}

pub struct Harness {
    pub pipeline: RagPipeline,
    pub embedder: Arc<FakeEmbedder>,
    pub generator: Arc<FakeGenerator>,
    pub store: Arc<InMemoryVectorStore>,
}

pub fn harness(config: PipelineConfig, embedder: FakeEmbedder) -> Harness {
    let embedder = Arc::new(embedder);
    let generator = Arc::new(FakeGenerator::new("Generated answer."));
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    let pipeline = RagPipeline::new(config, embedder.clone(), generator.clone(), store.clone())
        .expect("valid test pipeline");
    Harness {
        pipeline,
        embedder,
        generator,
        store,
    }
}

/// In-memory store whose upserts fail once a marker is set: every batch
/// holding a chunk whose text contains the marker is refused. An empty marker
/// refuses every upsert.
pub struct FlakyStore {
    pub inner: InMemoryVectorStore,
    pub refuse: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryVectorStore::new(DIM),
            refuse: Mutex::new(None),
        }
    }

    pub fn refuse_upserts_containing(&self, marker: &str) {
        *self.refuse.lock().unwrap() = Some(marker.to_string());
    }
}

impl VectorStore for FlakyStore {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.ensure_collection()
    }

    fn upsert<'a>(&'a self, entries: &'a [StoredChunk]) -> BoxFuture<'a, Result<usize, StoreError>> {
        let refused = self
            .refuse
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|m| entries.iter().any(|e| e.text.contains(m)));
        if refused {
            return Box::pin(async {
                Err(StoreError::Unavailable {
                    operation: "upsert",
                    attempts: 3,
                    message: "down".into(),
                })
            });
        }
        self.inner.upsert(entries)
    }

    fn search<'a>(
        &'a self,
        query: &'a [f32],
        top_k: usize,
        filter: Option<&'a RagFilter>,
    ) -> BoxFuture<'a, Result<Vec<RetrievalResult>, StoreError>> {
        self.inner.search(query, top_k, filter)
    }

    fn delete_document<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.delete_document(document_id)
    }

    fn delete_stale<'a>(
        &'a self,
        document_id: &'a str,
        keep: &'a [u32],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.delete_stale(document_id, keep)
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.delete_all()
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        self.inner.count()
    }
}

pub fn flaky_pipeline(config: PipelineConfig) -> (RagPipeline, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new());
    let pipeline = RagPipeline::new(
        config,
        Arc::new(FakeEmbedder::new()),
        Arc::new(FakeGenerator::new("Generated answer.")),
        store.clone(),
    )
    .expect("valid test pipeline");
    (pipeline, store)
}

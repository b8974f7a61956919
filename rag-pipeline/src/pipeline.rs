//! The orchestrator: ingestion, querying and deletion over injected
//! providers and a vector store.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rag_store::{RagFilter, VectorStore};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::assembler::ContextAssembler;
use crate::cancel::CancellationFlag;
use crate::chunker::Chunker;
use crate::config::PipelineConfig;
use crate::document::{Answer, Chunk, Document, DocumentStats, FailedRange, IngestReport, QueryContext};
use crate::embedding::{EmbeddingGateway, EmbeddingProvider};
use crate::error::{PipelineError, Stage};
use crate::generator::{AnswerGenerator, GenerationProvider};
use crate::progress::Progress;
use crate::retriever::Retriever;
use crate::state::{QueryRun, QueryState};

/// Per-query overrides of the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub score_threshold: Option<f32>,
    pub temperature: Option<f32>,
    pub filter: Option<RagFilter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: Answer,
    pub context: QueryContext,
    /// States the query went through, `Received` to `Completed`.
    pub trace: Vec<QueryState>,
}

/// A finished query run, successful or not, with the states it went through.
///
/// On failure the trace ends in [`QueryState::Failed`]. Requests rejected
/// before the run starts (blank question, bad overrides) have an empty trace.
#[derive(Debug)]
pub struct QueryOutcome {
    pub trace: Vec<QueryState>,
    pub result: Result<(Answer, QueryContext), PipelineError>,
}

impl QueryOutcome {
    pub fn into_response(self) -> Result<QueryResponse, PipelineError> {
        let (answer, context) = self.result?;
        Ok(QueryResponse {
            answer,
            context,
            trace: self.trace,
        })
    }
}

pub struct RagPipeline {
    config: PipelineConfig,
    chunker: Chunker,
    gateway: Arc<EmbeddingGateway>,
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    store: Arc<dyn VectorStore>,
}

impl RagPipeline {
    /// Validates `config` and wires the components.
    ///
    /// # Errors
    /// [`PipelineError::Configuration`] for invalid knobs or when the
    /// embedding dimension differs from the store's.
    pub fn new(
        config: PipelineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        if store.dimension() != config.embedding_dim {
            return Err(PipelineError::Configuration(format!(
                "embedding dimension {} does not match store dimension {}",
                config.embedding_dim,
                store.dimension()
            )));
        }

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let gateway = Arc::new(EmbeddingGateway::new(
            embedder,
            config.embedding_dim,
            config.embed_batch_size,
            config.embedding_concurrency,
            config.retry.clone(),
        )?);
        let retriever = Retriever::new(gateway.clone(), store.clone());
        let generator = AnswerGenerator::new(generator, config.retry.clone());

        Ok(Self {
            config,
            chunker,
            gateway,
            retriever,
            assembler: ContextAssembler::default(),
            generator,
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Creates the store collection if needed.
    pub async fn ensure_ready(&self) -> Result<(), PipelineError> {
        self.store
            .ensure_collection()
            .await
            .map_err(|e| PipelineError::from_store(Stage::Storing, "ensure_collection", e))
    }

    /// Chunks, embeds and stores a document, replacing any earlier version.
    ///
    /// Chunk ids are `document#position`, so new chunks overwrite the old
    /// version in place and only positions that were not rewritten are
    /// deleted afterwards. Nothing is written when a provider breaks its
    /// contract or when every batch fails, and a failed store write never
    /// removes the earlier version. When only some batches fail the rest is
    /// stored and [`PipelineError::PartialIngestion`] reports which positions
    /// are missing.
    #[instrument(skip_all, fields(document_id = %doc.id))]
    pub async fn ingest(&self, doc: &Document) -> Result<IngestReport, PipelineError> {
        if doc.id.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("document id must not be empty".into()));
        }

        let stats = DocumentStats::compute(&doc.source_text);
        let chunks: Vec<Chunk> = self
            .chunker
            .split(&doc.source_text)
            .into_iter()
            .map(|tc| Chunk::bind(&doc.id, tc))
            .collect();
        let mut report = IngestReport {
            document_id: doc.id.clone(),
            stats,
            chunks_total: chunks.len(),
            stored_positions: Vec::new(),
            failed: Vec::new(),
        };

        if chunks.is_empty() {
            self.delete_document(&doc.id).await?;
            info!("empty document, nothing to embed");
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut outcomes = self.gateway.embed_batches(&texts).await;

        // A provider that answers with the wrong shape is not trusted for any
        // batch, and a document with no embedded batch has nothing to store.
        let violation = outcomes
            .iter()
            .position(|o| matches!(o.result, Err(PipelineError::ProviderContractViolation { .. })));
        let all_failed = outcomes.iter().all(|o| o.result.is_err());
        if let Some(pos) = violation.or(all_failed.then_some(0)) {
            if let Err(e) = outcomes.swap_remove(pos).result {
                return Err(e);
            }
        }

        let mut first_store_error = None;
        for outcome in outcomes {
            let range = outcome.range.clone();
            let failed_range = |stage: Stage, reason: String| FailedRange {
                first_position: chunks[range.start].position,
                last_position: chunks[range.end - 1].position,
                stage,
                reason,
            };

            let vectors = match outcome.result {
                Ok(v) => v,
                Err(e) => {
                    warn!(batch = outcome.index, error = %e, "embedding batch failed");
                    report.failed.push(failed_range(Stage::Embedding, e.to_string()));
                    continue;
                }
            };

            let entries: Vec<_> = chunks[range.clone()]
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| chunk.into_stored(vector, &doc.metadata))
                .collect();
            match self.store.upsert(&entries).await {
                Ok(_) => report
                    .stored_positions
                    .extend(chunks[range.clone()].iter().map(|c| c.position)),
                Err(e) => {
                    let e = PipelineError::from_store(Stage::Storing, "upsert", e);
                    warn!(batch = outcome.index, error = %e, "storing batch failed");
                    report.failed.push(failed_range(Stage::Storing, e.to_string()));
                    first_store_error.get_or_insert(e);
                }
            }
        }

        // Nothing new was written, so the earlier version is still complete.
        if report.stored_positions.is_empty() {
            if let Some(e) = first_store_error {
                return Err(e);
            }
        }

        // Drops positions the new version does not have, and old chunks at
        // positions whose batch failed.
        self.store
            .delete_stale(&doc.id, &report.stored_positions)
            .await
            .map_err(|e| {
                let e = PipelineError::from_store(Stage::Deleting, "delete_stale", e);
                warn!(
                    stored = report.chunks_stored(),
                    error = %e,
                    "new chunks stored but stale chunks of the earlier version remain"
                );
                e
            })?;

        if !report.failed.is_empty() {
            warn!(
                stored = report.chunks_stored(),
                total = report.chunks_total,
                failed_ranges = report.failed.len(),
                "partial ingestion"
            );
            return Err(PipelineError::PartialIngestion(Box::new(report)));
        }

        info!(
            chunks = report.chunks_total,
            chars = report.stats.num_chars,
            "document ingested"
        );
        Ok(report)
    }

    /// Ingests several documents, at most `ingest_concurrency` at a time.
    /// Results come back in input order.
    pub async fn ingest_many(
        &self,
        docs: &[Document],
        progress: &dyn Progress,
    ) -> Vec<(String, Result<IngestReport, PipelineError>)> {
        progress.set_total(docs.len() as u64);
        let mut results: Vec<(usize, String, Result<IngestReport, PipelineError>)> =
            stream::iter(docs.iter().enumerate())
                .map(|(i, doc)| async move {
                    let r = self.ingest(doc).await;
                    progress.step(&doc.id);
                    (i, doc.id.clone(), r)
                })
                .buffer_unordered(self.config.ingest_concurrency)
                .collect()
                .await;
        results.sort_by_key(|(i, _, _)| *i);
        progress.finish("ingestion finished");
        results.into_iter().map(|(_, id, r)| (id, r)).collect()
    }

    /// Answers `question` with the configured defaults.
    pub async fn query(&self, question: &str) -> Result<QueryResponse, PipelineError> {
        self.query_with(question, &QueryOptions::default(), &CancellationFlag::new())
            .await
    }

    /// Runs a query through embedding, retrieval, assembly and generation.
    ///
    /// `cancel` is checked before each stage; once set, no further stage starts.
    pub async fn query_with(
        &self,
        question: &str,
        opts: &QueryOptions,
        cancel: &CancellationFlag,
    ) -> Result<QueryResponse, PipelineError> {
        self.query_traced(question, opts, cancel).await.into_response()
    }

    /// Like [`query_with`](Self::query_with) but keeps the state trace when
    /// the query fails.
    #[instrument(skip_all)]
    pub async fn query_traced(
        &self,
        question: &str,
        opts: &QueryOptions,
        cancel: &CancellationFlag,
    ) -> QueryOutcome {
        let (top_k, temperature) = match self.check_query(question, opts) {
            Ok(v) => v,
            Err(e) => {
                return QueryOutcome {
                    trace: Vec::new(),
                    result: Err(e),
                };
            }
        };

        let mut run = QueryRun::start();
        let result = self
            .run_stages(question, opts, top_k, temperature, cancel, &mut run)
            .await;
        match &result {
            Ok(_) => run.advance(),
            Err(e) => {
                let stage = e
                    .stage()
                    .or_else(|| run.current().stage())
                    .unwrap_or(Stage::Embedding);
                run.fail(stage, e.to_string());
            }
        }
        QueryOutcome {
            trace: run.into_trace(),
            result,
        }
    }

    fn check_query(&self, question: &str, opts: &QueryOptions) -> Result<(usize, f32), PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("question must not be empty".into()));
        }
        let top_k = opts.top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Err(PipelineError::InvalidArgument("top_k must be >= 1".into()));
        }
        let temperature = opts.temperature.unwrap_or(self.config.temperature);
        if !(temperature.is_finite() && (0.0..=2.0).contains(&temperature)) {
            return Err(PipelineError::InvalidArgument(format!(
                "temperature must be within 0.0..=2.0, got {temperature}"
            )));
        }
        Ok((top_k, temperature))
    }

    async fn run_stages(
        &self,
        question: &str,
        opts: &QueryOptions,
        top_k: usize,
        temperature: f32,
        cancel: &CancellationFlag,
        run: &mut QueryRun,
    ) -> Result<(Answer, QueryContext), PipelineError> {
        enter(cancel, run, Stage::Embedding)?;
        let vector = self.gateway.embed_query(question).await?;

        enter(cancel, run, Stage::Retrieving)?;
        let threshold = opts.score_threshold.or(self.config.score_threshold);
        let hits = self
            .retriever
            .search(&vector, top_k, threshold, opts.filter.as_ref())
            .await?;

        enter(cancel, run, Stage::Assembling)?;
        let context = self.assembler.assemble(&hits, self.config.max_context_chars);

        enter(cancel, run, Stage::Generating)?;
        let answer = self.generator.generate(question, &context, temperature).await?;

        Ok((answer, context))
    }

    /// Removes every chunk of a document. Unknown ids are a no-op.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), PipelineError> {
        self.store
            .delete_document(document_id)
            .await
            .map_err(|e| PipelineError::from_store(Stage::Deleting, "delete_document", e))
    }

    /// Removes every stored chunk of every document.
    pub async fn delete_all(&self) -> Result<(), PipelineError> {
        self.store
            .delete_all()
            .await
            .map_err(|e| PipelineError::from_store(Stage::Deleting, "delete_all", e))?;
        info!("all documents deleted");
        Ok(())
    }

    /// Number of chunks currently in the store.
    pub async fn stored_chunks(&self) -> Result<u64, PipelineError> {
        self.store
            .count()
            .await
            .map_err(|e| PipelineError::from_store(Stage::Retrieving, "count", e))
    }
}

/// Checks for cancellation, then moves the run into the next stage.
fn enter(cancel: &CancellationFlag, run: &mut QueryRun, stage: Stage) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        info!(%stage, "query cancelled");
        return Err(PipelineError::Cancelled { stage });
    }
    run.advance();
    Ok(())
}

//! Document-to-answer pipeline.
//!
//! Public entry point: [`RagPipeline`]. Ingestion splits a [`Document`] into
//! overlapping chunks, embeds them in concurrent batches and stores them in a
//! [`rag_store::VectorStore`]. A query embeds the question, retrieves the
//! nearest chunks, packs them into a character budget and asks the generation
//! provider for an answer that cites them.
//!
//! Providers and the store are injected as trait objects, so tests run the
//! whole pipeline with fakes and an in-memory store.

mod assembler;
mod cancel;
mod chunker;
mod config;
mod document;
mod embedding;
mod error;
mod generator;
mod pipeline;
mod progress;
pub mod prompt;
mod providers;
mod retriever;
mod state;

pub use assembler::ContextAssembler;
pub use cancel::CancellationFlag;
pub use chunker::{Chunker, Separator, split};
pub use config::PipelineConfig;
pub use document::{
    Answer, Chunk, Document, DocumentStats, FailedRange, IngestReport, MetadataValue, QueryContext,
    TextChunk,
};
pub use embedding::{BatchOutcome, EmbeddingGateway, EmbeddingProvider};
pub use error::{PipelineError, Stage};
pub use generator::{AnswerGenerator, CompletionRequest, GenerationProvider};
pub use pipeline::{QueryOptions, QueryOutcome, QueryResponse, RagPipeline};
pub use progress::{NoopProgress, Progress};
pub use retriever::Retriever;
pub use state::QueryState;

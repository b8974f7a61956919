//! Vector storage for document chunks.
//!
//! This crate provides the [`VectorStore`] capability and two implementations:
//! - [`QdrantStore`] for a real Qdrant deployment
//! - [`InMemoryVectorStore`] for tests and local runs
//!
//! The design is flat (no deep nesting) and splits responsibilities into focused modules.

mod config;
mod errors;
mod filters;
mod inmemory;
mod payload;
mod qdrant_facade;
mod record;
mod similarity;
mod store;

pub use config::{DistanceKind, StoreConfig, VectorSpace};
pub use errors::StoreError;
pub use inmemory::InMemoryVectorStore;
pub use qdrant_facade::QdrantStore;
pub use record::{RagFilter, RetrievalResult, StoredChunk, rank_results, stable_uuid};
pub use similarity::score as similarity_score;
pub use store::VectorStore;

//! Progress hooks for batch ingestion.
//!
//! The library reports through [`Progress`]; headless callers pass
//! [`NoopProgress`] and the CLI plugs in a terminal bar.

/// Receives one `step` per finished document during `ingest_many`.
pub trait Progress: Send + Sync {
    /// Number of documents about to be processed.
    fn set_total(&self, _n: u64) {}
    /// One document finished; `msg` is its id.
    fn step(&self, _msg: &str) {}
    /// Called once after the last document.
    fn finish(&self, _msg: &str) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl Progress for NoopProgress {}

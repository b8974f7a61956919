//! Unified error types for the crate.

use std::time::Duration;

use llm_service::Retryable;
use thiserror::Error;

/// Top-level error for vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Caller passed an argument the store cannot honor (e.g. `top_k == 0`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A vector does not have the collection's dimensionality.
    #[error("vector size mismatch for {chunk_id}: got {got}, want {want}")]
    VectorSizeMismatch {
        chunk_id: String,
        got: usize,
        want: usize,
    },

    /// The backend stayed unreachable after every retry.
    #[error("store unavailable during {operation} after {attempts} attempt(s): {message}")]
    Unavailable {
        operation: &'static str,
        attempts: u32,
        message: String,
    },

    /// Raw backend failure. `transient` marks connectivity-class failures.
    #[error("qdrant error during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
        transient: bool,
    },

    /// A single attempt exceeded its time limit.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Backend {
                transient: true,
                ..
            } | StoreError::Timeout(_)
        )
    }

    fn timed_out(after: Duration) -> Self {
        StoreError::Timeout(after)
    }
}

impl StoreError {
    /// Turns an exhausted transient failure into [`StoreError::Unavailable`];
    /// permanent failures pass through unchanged.
    pub(crate) fn after_retries(operation: &'static str, r: llm_service::Retried<StoreError>) -> Self {
        if r.exhausted() {
            StoreError::Unavailable {
                operation,
                attempts: r.attempts,
                message: r.error.to_string(),
            }
        } else {
            r.error
        }
    }
}

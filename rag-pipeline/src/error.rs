//! Typed error for the pipeline.
//!
//! Every variant that comes from an outbound call names the stage and the
//! operation that failed, so a caller can tell "the provider is down" apart
//! from "the provider answered garbage" and from "the store is down".

use std::fmt;

use llm_service::{LlmError, Retried};
use rag_store::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::document::IngestReport;

/// Where in the pipeline something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Chunking,
    Embedding,
    Retrieving,
    Assembling,
    Generating,
    Storing,
    Deleting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
            Stage::Storing => "storing",
            Stage::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid sizes, budgets or missing credentials. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transient provider failure that outlived every retry.
    #[error("[{stage}] provider unavailable during {operation} after {attempts} attempt(s): {message}")]
    ProviderUnavailable {
        stage: Stage,
        operation: String,
        attempts: u32,
        message: String,
    },

    /// The provider answered, but not with what was asked for.
    #[error("[{stage}] provider contract violation during {operation}: {detail}")]
    ProviderContractViolation {
        stage: Stage,
        operation: String,
        detail: String,
    },

    /// Non-transient refusal (authentication, bad request).
    #[error("[{stage}] provider rejected {operation}: {message}")]
    ProviderRejected {
        stage: Stage,
        operation: String,
        message: String,
    },

    #[error("[{stage}] vector store unavailable during {operation} after {attempts} attempt(s): {message}")]
    StoreUnavailable {
        stage: Stage,
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("[{stage}] vector store error: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    /// Some chunks were stored, some were not; the report says which.
    #[error(
        "partial ingestion of '{}': {}/{} chunks stored, {} range(s) failed",
        .0.document_id, .0.stored_positions.len(), .0.chunks_total, .0.failed.len()
    )]
    PartialIngestion(Box<IngestReport>),

    #[error("query cancelled before {stage}")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    /// Stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ProviderUnavailable { stage, .. }
            | PipelineError::ProviderContractViolation { stage, .. }
            | PipelineError::ProviderRejected { stage, .. }
            | PipelineError::StoreUnavailable { stage, .. }
            | PipelineError::Store { stage, .. }
            | PipelineError::Cancelled { stage } => Some(*stage),
            PipelineError::PartialIngestion(_) => Some(Stage::Storing),
            PipelineError::Configuration(_) | PipelineError::InvalidArgument(_) => None,
        }
    }

    /// Classifies a provider failure after the retry loop gave up.
    pub(crate) fn from_provider(stage: Stage, operation: impl Into<String>, r: Retried<LlmError>) -> Self {
        let operation = operation.into();
        if r.error.is_contract_violation() {
            PipelineError::ProviderContractViolation {
                stage,
                operation,
                detail: r.error.to_string(),
            }
        } else if r.exhausted() {
            PipelineError::ProviderUnavailable {
                stage,
                operation,
                attempts: r.attempts,
                message: r.error.to_string(),
            }
        } else if matches!(r.error, LlmError::Config(_)) {
            PipelineError::Configuration(r.error.to_string())
        } else {
            PipelineError::ProviderRejected {
                stage,
                operation,
                message: r.error.to_string(),
            }
        }
    }

    pub(crate) fn from_store(stage: Stage, operation: &str, e: StoreError) -> Self {
        match e {
            StoreError::Unavailable {
                attempts, message, ..
            } => PipelineError::StoreUnavailable {
                stage,
                operation: operation.to_string(),
                attempts,
                message,
            },
            StoreError::InvalidArgument(msg) => PipelineError::InvalidArgument(msg),
            StoreError::Config(msg) => PipelineError::Configuration(msg),
            other => PipelineError::Store {
                stage,
                source: other,
            },
        }
    }

    pub(crate) fn contract(stage: Stage, operation: impl Into<String>, detail: impl Into<String>) -> Self {
        PipelineError::ProviderContractViolation {
            stage,
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

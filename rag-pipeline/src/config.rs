//! Pipeline knobs, validated once at construction.

use std::fmt;

use llm_service::RetryPolicy;
use llm_service::error_handler::env_opt;

use crate::chunker::Chunker;
use crate::error::PipelineError;

#[derive(Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Expected embedding dimension; must match the store.
    pub embedding_dim: usize,
    pub embed_batch_size: usize,
    /// Embedding batches in flight per document.
    pub embedding_concurrency: usize,
    /// Documents ingested in parallel by `ingest_many`.
    pub ingest_concurrency: usize,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    /// Context budget in characters.
    pub max_context_chars: usize,
    pub temperature: f32,
    pub retry: RetryPolicy,
    /// Request-authentication secret for an HTTP front end. Not used here.
    pub auth_secret: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_dim: 1536,
            embed_batch_size: 100,
            embedding_concurrency: 4,
            ingest_concurrency: 2,
            top_k: 4,
            score_threshold: None,
            max_context_chars: 8500,
            temperature: 0.2,
            retry: RetryPolicy::default(),
            auth_secret: None,
        }
    }
}

// Hand-written so the secret never reaches the logs.
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("embedding_dim", &self.embedding_dim)
            .field("embed_batch_size", &self.embed_batch_size)
            .field("embedding_concurrency", &self.embedding_concurrency)
            .field("ingest_concurrency", &self.ingest_concurrency)
            .field("top_k", &self.top_k)
            .field("score_threshold", &self.score_threshold)
            .field("max_context_chars", &self.max_context_chars)
            .field("temperature", &self.temperature)
            .field("retry", &self.retry)
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Reads the configuration from the environment, falling back to defaults.
    ///
    /// # Env
    /// - `CHUNK_SIZE` / `CHUNK_OVERLAP` (1000 / 200)
    /// - `EMBEDDING_DIM` (1536)
    /// - `EMBED_BATCH_SIZE` (100), `EMBEDDING_CONCURRENCY` (4), `INGEST_CONCURRENCY` (2)
    /// - `RAG_TOP_K` (4), `SCORE_THRESHOLD` (unset)
    /// - `MAX_CTX_CHARS` (8500)
    /// - `LLM_TEMPERATURE` (0.2)
    /// - `SECRET_KEY` (unset)
    /// - retry variables, see [`RetryPolicy::from_env`]
    pub fn from_env() -> Result<Self, PipelineError> {
        let d = Self::default();
        let cfg = Self {
            chunk_size: parse_env("CHUNK_SIZE", d.chunk_size)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", d.chunk_overlap)?,
            embedding_dim: parse_env("EMBEDDING_DIM", d.embedding_dim)?,
            embed_batch_size: parse_env("EMBED_BATCH_SIZE", d.embed_batch_size)?,
            embedding_concurrency: parse_env("EMBEDDING_CONCURRENCY", d.embedding_concurrency)?,
            ingest_concurrency: parse_env("INGEST_CONCURRENCY", d.ingest_concurrency)?,
            top_k: parse_env("RAG_TOP_K", d.top_k)?,
            score_threshold: match env_opt("SCORE_THRESHOLD") {
                Some(_) => Some(parse_env("SCORE_THRESHOLD", 0.0f32)?),
                None => None,
            },
            max_context_chars: parse_env("MAX_CTX_CHARS", d.max_context_chars)?,
            temperature: parse_env("LLM_TEMPERATURE", d.temperature)?,
            retry: RetryPolicy::from_env().map_err(|e| PipelineError::Configuration(e.to_string()))?,
            auth_secret: env_opt("SECRET_KEY"),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        Chunker::new(self.chunk_size, self.chunk_overlap)?;

        let positive = [
            ("EMBEDDING_DIM", self.embedding_dim),
            ("EMBED_BATCH_SIZE", self.embed_batch_size),
            ("EMBEDDING_CONCURRENCY", self.embedding_concurrency),
            ("INGEST_CONCURRENCY", self.ingest_concurrency),
            ("RAG_TOP_K", self.top_k),
            ("MAX_CTX_CHARS", self.max_context_chars),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(PipelineError::Configuration(format!("{name} must be >= 1")));
        }
        if !(self.temperature.is_finite() && (0.0..=2.0).contains(&self.temperature)) {
            return Err(PipelineError::Configuration(format!(
                "LLM_TEMPERATURE must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.score_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(PipelineError::Configuration("SCORE_THRESHOLD must be finite".into()));
        }
        self.retry
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, PipelineError> {
    match env_opt(name) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| PipelineError::Configuration(format!("{name} has an invalid value '{v}'"))),
        None => Ok(default),
    }
}

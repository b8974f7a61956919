//! Runtime and collection configuration.

use llm_service::RetryPolicy;
use llm_service::error_handler::env_opt;

use crate::errors::StoreError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DistanceKind {
    /// Cosine similarity (recommended for most embeddings).
    #[default]
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2), reported as `1 / (1 + d)` so higher is closer.
    Euclid,
}

impl std::str::FromStr for DistanceKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceKind::Cosine),
            "dot" => Ok(DistanceKind::Dot),
            "euclid" | "euclidean" | "l2" => Ok(DistanceKind::Euclid),
            other => Err(StoreError::Config(format!("unknown distance '{other}'"))),
        }
    }
}

/// Describes the vector space of the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Configuration for the Qdrant-backed store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Dimension and distance of stored vectors.
    pub space: VectorSpace,
    /// Upsert batch size.
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Retry policy for every backend call.
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            space: VectorSpace {
                size: dimension,
                distance: DistanceKind::Cosine,
            },
            upsert_batch: 100,
            exact_search: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Reads the store configuration from the environment.
    ///
    /// # Env
    /// - `QDRANT_URL` (default `http://127.0.0.1:6334`)
    /// - `QDRANT_API_KEY` (optional)
    /// - `QDRANT_COLLECTION` (default `Document`)
    /// - `QDRANT_DISTANCE` (default `cosine`)
    /// - `QDRANT_BATCH_SIZE` (default 100)
    /// - `RAG_EXACT_SEARCH` (default false)
    /// - `EMBEDDING_DIM` (default 1536)
    pub fn from_env(retry: RetryPolicy) -> Result<Self, StoreError> {
        let dimension = parse_env("EMBEDDING_DIM", 1536usize)?;
        let mut cfg = Self::new_default(
            env_opt("QDRANT_URL").unwrap_or_else(|| "http://127.0.0.1:6334".into()),
            env_opt("QDRANT_COLLECTION").unwrap_or_else(|| "Document".into()),
            dimension,
        );
        cfg.qdrant_api_key = env_opt("QDRANT_API_KEY");
        if let Some(d) = env_opt("QDRANT_DISTANCE") {
            cfg.space.distance = d.parse()?;
        }
        cfg.upsert_batch = parse_env("QDRANT_BATCH_SIZE", cfg.upsert_batch)?;
        cfg.exact_search = parse_env("RAG_EXACT_SEARCH", false)?;
        cfg.retry = retry;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(StoreError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(StoreError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(StoreError::Config("upsert_batch must be > 0".into()));
        }
        if self.space.size == 0 {
            return Err(StoreError::Config("vector dimension must be > 0".into()));
        }
        self.retry
            .validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, StoreError> {
    match env_opt(name) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| StoreError::Config(format!("{name} has an invalid value '{v}'"))),
        None => Ok(default),
    }
}

//! Core data models stored in and returned by a [`VectorStore`](crate::VectorStore).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One chunk with its vector, as written by `upsert`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique, stable chunk id (`"{document_id}#{position}"` by convention).
    pub chunk_id: String,
    /// Owning document; used for cascade delete.
    pub document_id: String,
    /// Ordinal of the chunk within its document.
    pub position: u32,
    pub text: String,
    pub vector: Vec<f32>,
    /// Scalar metadata carried next to the chunk (filename, offsets, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// A single search hit. Ephemeral, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub document_id: String,
    pub position: u32,
    /// Higher means more relevant.
    pub similarity_score: f32,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Exact-match filter over chunk fields and metadata, all conditions must hold.
///
/// `document_id`, `chunk_id` and `position` address the chunk itself; any other
/// key is looked up in the chunk metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RagFilter {
    pub equals: Vec<(String, Value)>,
}

impl RagFilter {
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            equals: vec![("document_id".into(), Value::String(document_id.into()))],
        }
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

/// Derives a deterministic UUIDv5 from a chunk id so re-upserts hit the same point.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Orders hits by descending score, ties broken by the smaller `chunk_id`.
pub fn rank_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id.into(),
            document_id: "d".into(),
            position: 0,
            similarity_score: score,
            text: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn ranking_breaks_ties_by_chunk_id() {
        let mut v = vec![hit("b", 0.5), hit("c", 0.9), hit("a", 0.5)];
        rank_results(&mut v);
        let ids: Vec<_> = v.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn stable_uuid_is_deterministic() {
        assert_eq!(stable_uuid("doc#1"), stable_uuid("doc#1"));
        assert_ne!(stable_uuid("doc#1"), stable_uuid("doc#2"));
    }
}

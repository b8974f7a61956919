//! Data model shared by ingestion and query.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use rag_store::{RetrievalResult, StoredChunk};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Stage;

/// Scalar metadata value attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl MetadataValue {
    fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Bool(b) => serde_json::Value::Bool(*b),
            MetadataValue::Integer(i) => serde_json::Value::from(*i),
            MetadataValue::Float(f) => serde_json::json!(f),
            MetadataValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// An uploaded document. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Document {
    pub fn new(id: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_text: source_text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds a document for an uploaded file.
    ///
    /// The id is the bare file name, so uploading the same file again replaces
    /// the earlier copy. `filename` and `uploaded_at` are recorded as metadata.
    pub fn from_upload(filename: &str, text: impl Into<String>) -> Self {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .trim();
        let uploaded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Self::new(name, text)
            .with_metadata("filename", name)
            .with_metadata("uploaded_at", uploaded_at)
    }
}

/// A chunk as produced by the chunker, before it is bound to a document.
///
/// Offsets are in characters (Unicode scalar values), end-exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub text: String,
    pub position: u32,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// A chunk owned by a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub position: u32,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, position: u32) -> String {
        format!("{document_id}#{position}")
    }

    pub fn bind(document_id: &str, tc: TextChunk) -> Self {
        Self {
            id: Self::chunk_id(document_id, tc.position),
            document_id: document_id.to_string(),
            text: tc.text,
            position: tc.position,
            start_offset: tc.start_offset,
            end_offset: tc.end_offset,
        }
    }

    /// Store record for this chunk. Document metadata travels with every chunk
    /// so it can be used in search filters.
    pub(crate) fn into_stored(self, vector: Vec<f32>, doc_meta: &BTreeMap<String, MetadataValue>) -> StoredChunk {
        let mut metadata: BTreeMap<String, serde_json::Value> = doc_meta
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        metadata.insert("start_offset".into(), self.start_offset.into());
        metadata.insert("end_offset".into(), self.end_offset.into());
        StoredChunk {
            chunk_id: self.id,
            document_id: self.document_id,
            position: self.position,
            text: self.text,
            vector,
            metadata,
        }
    }
}

/// Basic text statistics recorded at ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub num_chars: usize,
    pub num_words: usize,
    pub num_sentences: usize,
}

impl DocumentStats {
    pub fn compute(text: &str) -> Self {
        Self {
            num_chars: text.chars().count(),
            num_words: text.unicode_words().count(),
            num_sentences: text
                .unicode_sentences()
                .filter(|s| !s.trim().is_empty())
                .count(),
        }
    }
}

/// A contiguous range of chunk positions that could not be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRange {
    pub first_position: u32,
    pub last_position: u32,
    pub stage: Stage,
    pub reason: String,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub stats: DocumentStats,
    pub chunks_total: usize,
    pub stored_positions: Vec<u32>,
    pub failed: Vec<FailedRange>,
}

impl IngestReport {
    pub fn chunks_stored(&self) -> usize {
        self.stored_positions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.stored_positions.len() == self.chunks_total
    }
}

/// Retrieved chunks chosen for the prompt, in rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryContext {
    pub results: Vec<RetrievalResult>,
    /// Rendered context as it goes into the prompt.
    pub text: String,
    /// Length of `text` in characters; never above the budget.
    pub total_length: usize,
    /// Set when the top chunk alone was over budget and got cut.
    pub truncated: bool,
}

impl QueryContext {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.results.iter().map(|r| r.chunk_id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub source_chunk_ids: Vec<String>,
    /// False when no context was available and the model answered unaided.
    pub grounded: bool,
}

//! Filter evaluation: conversion to Qdrant `Filter` and in-process matching.
//!
//! Supports exact equality on scalar values (`String`, integer `Number`, `Bool`).

use crate::errors::StoreError;
use crate::record::{RagFilter, StoredChunk};
use qdrant_client::qdrant::{
    Condition, FieldCondition, Filter, Match, RepeatedIntegers, condition::ConditionOneOf,
    r#match::MatchValue,
};
use serde_json::Value;
use tracing::debug;

const CHUNK_FIELDS: [&str; 3] = ["document_id", "chunk_id", "position"];

/// Payload key for a filter field: chunk fields live at the top level,
/// everything else under the `metadata` object.
pub(crate) fn payload_key(field: &str) -> String {
    if CHUNK_FIELDS.contains(&field) {
        field.to_string()
    } else {
        format!("metadata.{field}")
    }
}

/// Converts [`RagFilter`] to a Qdrant [`Filter`] where every condition must hold.
///
/// # Errors
/// [`StoreError::InvalidArgument`] for values Qdrant cannot match exactly
/// (floats, arrays, objects, null).
pub fn to_qdrant_filter(f: &RagFilter) -> Result<Filter, StoreError> {
    debug!(conditions = f.equals.len(), "filters::to_qdrant_filter");

    let mut must: Vec<Condition> = Vec::with_capacity(f.equals.len());
    for (field, val) in &f.equals {
        let match_value = match val {
            Value::String(s) => MatchValue::Keyword(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MatchValue::Integer(i),
                None => return Err(unsupported(field, val)),
            },
            Value::Bool(b) => MatchValue::Boolean(*b),
            _ => return Err(unsupported(field, val)),
        };
        must.push(field_condition(field, match_value));
    }

    Ok(Filter {
        must,
        ..Default::default()
    })
}

/// Chunks of `document_id` whose position is not in `keep`.
pub(crate) fn stale_positions_filter(document_id: &str, keep: &[u32]) -> Filter {
    let must = vec![field_condition(
        "document_id",
        MatchValue::Keyword(document_id.to_string()),
    )];
    let must_not = if keep.is_empty() {
        Vec::new()
    } else {
        vec![field_condition(
            "position",
            MatchValue::Integers(RepeatedIntegers {
                integers: keep.iter().map(|&p| i64::from(p)).collect(),
            }),
        )]
    };
    Filter {
        must,
        must_not,
        ..Default::default()
    }
}

fn field_condition(field: &str, match_value: MatchValue) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: payload_key(field),
            r#match: Some(Match {
                match_value: Some(match_value),
            }),
            ..Default::default()
        })),
    }
}

fn unsupported(field: &str, val: &Value) -> StoreError {
    StoreError::InvalidArgument(format!(
        "filter on `{field}` needs a string, integer or boolean value, got {val}"
    ))
}

/// Evaluates the filter against a chunk held in memory.
pub fn matches(f: &RagFilter, chunk: &StoredChunk) -> bool {
    f.equals.iter().all(|(field, want)| match field.as_str() {
        "document_id" => want.as_str() == Some(chunk.document_id.as_str()),
        "chunk_id" => want.as_str() == Some(chunk.chunk_id.as_str()),
        "position" => want.as_u64() == Some(u64::from(chunk.position)),
        other => chunk.metadata.get(other) == Some(want),
    })
}

//! Conversion between chunk records and Qdrant payloads.
//!
//! Layout of a stored point payload:
//! `chunk_id`, `document_id`, `position`, `text` at the top level and the
//! chunk metadata as a nested `metadata` object.

use std::collections::{BTreeMap, HashMap};

use qdrant_client::qdrant::{ListValue, Struct, Value as QValue, value::Kind};
use serde_json::Value;

use crate::record::{RetrievalResult, StoredChunk};

pub(crate) fn chunk_payload(chunk: &StoredChunk) -> HashMap<String, QValue> {
    let mut payload = HashMap::with_capacity(5);
    payload.insert("chunk_id".to_string(), qstring(&chunk.chunk_id));
    payload.insert("document_id".to_string(), qstring(&chunk.document_id));
    payload.insert(
        "position".to_string(),
        QValue {
            kind: Some(Kind::IntegerValue(i64::from(chunk.position))),
        },
    );
    payload.insert("text".to_string(), qstring(&chunk.text));
    if !chunk.metadata.is_empty() {
        let fields = chunk
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), json_to_qvalue(v.clone())))
            .collect();
        payload.insert(
            "metadata".to_string(),
            QValue {
                kind: Some(Kind::StructValue(Struct { fields })),
            },
        );
    }
    payload
}

/// Rebuilds a hit from a point payload; `None` if the chunk fields are missing.
pub(crate) fn hit_from_payload(payload: HashMap<String, QValue>, score: f32) -> Option<RetrievalResult> {
    let mut json = qpayload_to_json(payload);
    let obj = json.as_object_mut()?;

    let chunk_id = obj.remove("chunk_id")?.as_str()?.to_string();
    let document_id = obj.remove("document_id")?.as_str()?.to_string();
    let position = obj.remove("position")?.as_u64()? as u32;
    let text = obj.remove("text")?.as_str()?.to_string();
    let metadata: BTreeMap<String, Value> = match obj.remove("metadata") {
        Some(Value::Object(m)) => m.into_iter().collect(),
        _ => BTreeMap::new(),
    };

    Some(RetrievalResult {
        chunk_id,
        document_id,
        position,
        similarity_score: score,
        text,
        metadata,
    })
}

fn qstring(s: &str) -> QValue {
    QValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn json_to_qvalue(v: Value) -> QValue {
    let kind = match v {
        Value::String(s) => Some(Kind::StringValue(s)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(Kind::IntegerValue(i)),
            (None, Some(f)) => Some(Kind::DoubleValue(f)),
            (None, None) => Some(Kind::StringValue(n.to_string())),
        },
        Value::Bool(b) => Some(Kind::BoolValue(b)),
        Value::Array(arr) => Some(Kind::ListValue(ListValue {
            values: arr.into_iter().map(json_to_qvalue).collect(),
        })),
        Value::Object(map) => Some(Kind::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, json_to_qvalue(v))).collect(),
        })),
        Value::Null => None,
    };
    QValue { kind }
}

fn qvalue_to_json(v: QValue) -> Value {
    match v.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(f)) => serde_json::json!(f),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::ListValue(l)) => Value::Array(l.values.into_iter().map(qvalue_to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qvalue_to_json(v)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn qpayload_to_json(p: HashMap<String, QValue>) -> Value {
    Value::Object(p.into_iter().map(|(k, v)| (k, qvalue_to_json(v))).collect())
}

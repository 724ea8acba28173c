// tidebase-core/src/document.rs
// The immutable unit of state: one version of one document

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single version of a document, immutable after creation.
///
/// A `null` value marks the record as a tombstone: the key is deleted but
/// the record stays visible on the change feed until garbage collection
/// or eviction discards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque key, unique within its collection
    pub key: String,
    /// Arbitrary JSON value; `null` denotes a tombstone
    pub value: Value,
    /// 1-based ordinal within the key's version log
    pub version: u64,
    /// Wall-clock seconds at append time (monotonicity not required)
    pub timestamp: f64,
    /// Globally unique, strictly increasing across all collections
    pub transaction_id: u64,
}

/// Change operation derived from a record at extraction time; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Document {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(key: String, value: Value, version: u64, transaction_id: u64) -> Self {
        Document {
            key,
            value,
            version,
            timestamp: now_seconds(),
            transaction_id,
        }
    }

    /// A tombstone is a record whose value is JSON null.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_null()
    }

    /// Derive the change operation: tombstones are deletes (even at
    /// version 1), version 1 is an insert, everything else an update.
    pub fn operation(&self) -> Operation {
        if self.value.is_null() {
            Operation::Delete
        } else if self.version == 1 {
            Operation::Insert
        } else {
            Operation::Update
        }
    }
}

/// Wall-clock seconds with microsecond precision.
pub(crate) fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value, version: u64) -> Document {
        Document::new("k1".to_string(), value, version, 7)
    }

    #[test]
    fn test_operation_insert_at_version_one() {
        let doc = record(json!({"n": "A"}), 1);
        assert_eq!(doc.operation(), Operation::Insert);
        assert!(!doc.is_tombstone());
    }

    #[test]
    fn test_operation_update_after_version_one() {
        let doc = record(json!({"n": "B"}), 2);
        assert_eq!(doc.operation(), Operation::Update);
    }

    #[test]
    fn test_tombstone_is_delete() {
        let doc = record(Value::Null, 3);
        assert!(doc.is_tombstone());
        assert_eq!(doc.operation(), Operation::Delete);
    }

    #[test]
    fn test_delete_at_version_one_is_still_delete() {
        let doc = record(Value::Null, 1);
        assert_eq!(doc.operation(), Operation::Delete);
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Operation::Insert).unwrap(), "\"insert\"");
        assert_eq!(serde_json::to_string(&Operation::Delete).unwrap(), "\"delete\"");
        assert_eq!(Operation::Update.to_string(), "update");
    }

    #[test]
    fn test_record_roundtrip_keeps_stored_fields() {
        let doc = record(json!({"age": 30}), 2);
        let encoded = serde_json::to_string(&doc).unwrap();
        let restored: Document = serde_json::from_str(&encoded).unwrap();
        assert_eq!(restored, doc);

        // Exactly the five stored fields appear on the wire
        let raw: Value = serde_json::from_str(&encoded).unwrap();
        let obj = raw.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        for field in ["key", "value", "version", "timestamp", "transaction_id"] {
            assert!(obj.contains_key(field), "missing field {}", field);
        }
    }

    #[test]
    fn test_timestamp_is_recent() {
        let doc = record(json!(1), 1);
        let now = now_seconds();
        assert!(doc.timestamp <= now);
        assert!(now - doc.timestamp < 5.0);
    }
}

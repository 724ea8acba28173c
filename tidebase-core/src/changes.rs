// tidebase-core/src/changes.rs
// Change-feed result types

use serde::Serialize;

use crate::document::{Document, Operation};

/// One feed entry: a record paired with the operation derived from it at
/// extraction time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    #[serde(flatten)]
    pub document: Document,
    pub operation: Operation,
}

impl ChangeEvent {
    pub fn new(document: Document) -> Self {
        let operation = document.operation();
        ChangeEvent {
            document,
            operation,
        }
    }
}

/// Result of a change-feed read: a transaction-id-ordered prefix of the
/// feed, or an empty batch flagged `needs_rollback` when the caller's
/// cursor predates the rollback watermark and records it would need have
/// been discarded. `last_transaction_id` is the store's current maximum,
/// the point from which a rebuilt reader should resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBatch {
    pub changes: Vec<ChangeEvent>,
    pub needs_rollback: bool,
    pub last_transaction_id: u64,
}

impl ChangeBatch {
    pub(crate) fn rollback(last_transaction_id: u64) -> Self {
        ChangeBatch {
            changes: Vec::new(),
            needs_rollback: true,
            last_transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_change_event_derives_operation() {
        let insert = ChangeEvent::new(Document::new("k".into(), json!(1), 1, 1));
        assert_eq!(insert.operation, Operation::Insert);

        let update = ChangeEvent::new(Document::new("k".into(), json!(2), 2, 2));
        assert_eq!(update.operation, Operation::Update);

        let delete = ChangeEvent::new(Document::new("k".into(), Value::Null, 3, 3));
        assert_eq!(delete.operation, Operation::Delete);
    }

    #[test]
    fn test_change_event_wire_shape() {
        let event = ChangeEvent::new(Document::new("k".into(), json!({"a": 1}), 2, 5));
        let raw = serde_json::to_value(&event).unwrap();
        // Record fields are flattened next to the operation
        assert_eq!(raw["key"], "k");
        assert_eq!(raw["version"], 2);
        assert_eq!(raw["transaction_id"], 5);
        assert_eq!(raw["operation"], "update");
    }

    #[test]
    fn test_rollback_batch() {
        let batch = ChangeBatch::rollback(42);
        assert!(batch.needs_rollback);
        assert!(batch.changes.is_empty());
        assert_eq!(batch.last_transaction_id, 42);
    }
}

// tidebase-core/src/storage/mod.rs
//! Snapshot persistence seam.
//!
//! The engine rewrites the whole store as one JSON snapshot after every
//! successful write mutation. [`SnapshotBackend`] is the storage seam:
//! [`FileSnapshot`] is the production backend, [`MemorySnapshot`] backs
//! tests. Both go through the same [`Snapshot`] codec so tests exercise
//! the real wire layout.

mod file_snapshot;
mod memory_snapshot;

pub use file_snapshot::FileSnapshot;
pub use memory_snapshot::MemorySnapshot;

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{Result, TideBaseError};

/// Reserved top-level snapshot field holding the id counter.
pub const LAST_TRANSACTION_ID_FIELD: &str = "last_transaction_id";

/// Reserved top-level snapshot field holding the rollback watermark.
/// Older snapshots may lack it; they load with a zero watermark.
pub const HIGHEST_REMOVED_TOMBSTONE_ID_FIELD: &str = "highest_removed_tombstone_id";

/// Whole-store snapshot: every version log plus the id counter and the
/// rollback watermark.
///
/// On-disk layout is flat - collections sit next to the reserved scalar
/// fields - so collection names equal to a reserved field name are
/// refused at write time by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub collections: HashMap<String, HashMap<String, Vec<Document>>>,
    pub last_transaction_id: u64,
    pub highest_removed_tombstone_id: u64,
}

impl Snapshot {
    /// Serialise to the on-disk layout:
    /// `{ "<collection>": { "<key>": [records] },
    ///    "last_transaction_id": n, "highest_removed_tombstone_id": n }`
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut root = Map::new();
        for (name, logs) in &self.collections {
            let mut keys = Map::new();
            for (key, records) in logs {
                keys.insert(key.clone(), serde_json::to_value(records)?);
            }
            root.insert(name.clone(), Value::Object(keys));
        }
        root.insert(
            LAST_TRANSACTION_ID_FIELD.to_string(),
            Value::from(self.last_transaction_id),
        );
        root.insert(
            HIGHEST_REMOVED_TOMBSTONE_ID_FIELD.to_string(),
            Value::from(self.highest_removed_tombstone_id),
        );
        Ok(serde_json::to_vec(&Value::Object(root))?)
    }

    /// Decode the on-disk layout. Reserved fields are separated from the
    /// collection data; any malformed node is a `Corruption` error.
    pub fn from_json(bytes: &[u8]) -> Result<Snapshot> {
        let root: Value = serde_json::from_slice(bytes)
            .map_err(|e| TideBaseError::Corruption(format!("invalid snapshot JSON: {}", e)))?;
        let root = match root {
            Value::Object(map) => map,
            _ => {
                return Err(TideBaseError::Corruption(
                    "snapshot root must be an object".to_string(),
                ))
            }
        };

        let mut snapshot = Snapshot::default();
        for (name, entry) in root {
            if name == LAST_TRANSACTION_ID_FIELD {
                snapshot.last_transaction_id = scalar_field(&name, &entry)?;
                continue;
            }
            if name == HIGHEST_REMOVED_TOMBSTONE_ID_FIELD {
                snapshot.highest_removed_tombstone_id = scalar_field(&name, &entry)?;
                continue;
            }

            let keys = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(TideBaseError::Corruption(format!(
                        "collection '{}' must be an object",
                        name
                    )))
                }
            };
            let mut logs = HashMap::new();
            for (key, records) in keys {
                let records: Vec<Document> = serde_json::from_value(records).map_err(|e| {
                    TideBaseError::Corruption(format!(
                        "bad records for '{}/{}': {}",
                        name, key, e
                    ))
                })?;
                logs.insert(key, records);
            }
            snapshot.collections.insert(name, logs);
        }
        Ok(snapshot)
    }
}

fn scalar_field(name: &str, entry: &Value) -> Result<u64> {
    entry
        .as_u64()
        .ok_or_else(|| TideBaseError::Corruption(format!("'{}' must be a non-negative integer", name)))
}

/// Storage backend for whole-store snapshots.
pub trait SnapshotBackend: Send {
    /// Load the last saved snapshot; `None` when nothing was saved yet.
    fn load(&mut self) -> Result<Option<Snapshot>>;

    /// Persist a snapshot, replacing any previous one.
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

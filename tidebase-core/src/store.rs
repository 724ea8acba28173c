// tidebase-core/src/store.rs
//! The TideBase engine: version logs, transaction-id allocation, read and
//! query paths, the change feed, and the garbage collector.
//!
//! Concurrency: a single `RwLock` protects the state triple (collections,
//! `current_transaction_id`, `highest_removed_tombstone_id`). Every write
//! operation holds the write guard across mutate -> allocate id -> append
//! -> persist, so id allocation order, append order, and persistence order
//! coincide. Readers share the read guard; the change feed's rollback
//! guard and its scan observe the same state.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::changes::{ChangeBatch, ChangeEvent};
use crate::document::{now_seconds, Document};
use crate::error::{Result, TideBaseError};
use crate::query::Predicate;
use crate::storage::{
    FileSnapshot, MemorySnapshot, Snapshot, SnapshotBackend,
    HIGHEST_REMOVED_TOMBSTONE_ID_FIELD, LAST_TRANSACTION_ID_FIELD,
};
use crate::version_log::VersionLog;
use crate::{log_info, log_warn};

/// Result of `list_documents` / `query_documents`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum DocumentListing {
    /// Record history per key (possibly filtered)
    Full(HashMap<String, Vec<Document>>),
    /// One record per key: the latest live one (list) or the
    /// highest-version match (query)
    Latest(HashMap<String, Document>),
}

impl DocumentListing {
    pub fn len(&self) -> usize {
        match self {
            DocumentListing::Full(map) => map.len(),
            DocumentListing::Latest(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            DocumentListing::Full(map) => map.contains_key(key),
            DocumentListing::Latest(map) => map.contains_key(key),
        }
    }
}

/// Mutable engine state guarded by the store's lock.
#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<String, HashMap<String, VersionLog>>,
    current_transaction_id: u64,
    highest_removed_tombstone_id: u64,
}

impl StoreState {
    /// Hand out the next transaction id. Must be called exactly once per
    /// appended record, under the write guard. Ids are never reused.
    fn next_transaction_id(&mut self) -> u64 {
        self.current_transaction_id += 1;
        self.current_transaction_id
    }

    fn log(&self, collection: &str, key: &str) -> Option<&VersionLog> {
        self.collections.get(collection)?.get(key)
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut collections = HashMap::new();
        for (name, logs) in &self.collections {
            let mut keys = HashMap::new();
            for (key, log) in logs {
                keys.insert(key.clone(), log.records().to_vec());
            }
            collections.insert(name.clone(), keys);
        }
        Snapshot {
            collections,
            last_transaction_id: self.current_transaction_id,
            highest_removed_tombstone_id: self.highest_removed_tombstone_id,
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> StoreState {
        let mut collections = HashMap::new();
        for (name, keys) in snapshot.collections {
            let mut logs = HashMap::new();
            for (key, records) in keys {
                logs.insert(key, VersionLog::from_records(records));
            }
            collections.insert(name, logs);
        }
        StoreState {
            collections,
            current_transaction_id: snapshot.last_transaction_id,
            highest_removed_tombstone_id: snapshot.highest_removed_tombstone_id,
        }
    }
}

/// Versioned document store with a monotonic change feed.
///
/// Generic over the snapshot backend:
/// - `Store<FileSnapshot>` - production, persisted to one JSON file
/// - `Store<MemorySnapshot>` - in-memory, for tests and ephemeral use
pub struct Store<S: SnapshotBackend> {
    state: RwLock<StoreState>,
    backend: Mutex<S>,
}

impl Store<FileSnapshot> {
    /// Open (or create) a store persisted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Store::with_backend(FileSnapshot::new(path))
    }
}

impl Store<MemorySnapshot> {
    /// Fresh store without disk persistence.
    pub fn in_memory() -> Self {
        Store::with_backend(MemorySnapshot::new())
    }
}

impl<S: SnapshotBackend> Store<S> {
    /// Create a store over a backend, loading any existing snapshot.
    /// Load failures reset to an empty store with a logged warning; they
    /// never propagate to the caller.
    pub fn with_backend(mut backend: S) -> Self {
        let state = match backend.load() {
            Ok(Some(snapshot)) => StoreState::from_snapshot(snapshot),
            Ok(None) => StoreState::default(),
            Err(err) => {
                log_warn!("failed to load snapshot, starting empty: {}", err);
                StoreState::default()
            }
        };
        Store {
            state: RwLock::new(state),
            backend: Mutex::new(backend),
        }
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Append a new version for (collection, key), creating the collection
    /// and the log on first write. The value may be any JSON, including
    /// null - though callers should use `delete` for deletes.
    pub fn upsert(&self, collection: &str, key: &str, value: Value) -> Result<Document> {
        if collection == LAST_TRANSACTION_ID_FIELD
            || collection == HIGHEST_REMOVED_TOMBSTONE_ID_FIELD
        {
            return Err(TideBaseError::InvalidInput(format!(
                "'{}' is a reserved name",
                collection
            )));
        }

        let mut state = self.state.write();
        let transaction_id = state.next_transaction_id();
        let record = state
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .append(key, value, transaction_id);
        self.persist(&state);
        Ok(record)
    }

    /// Append a tombstone; returns false when the key has no log.
    /// Deleting an already-deleted key appends another tombstone so the
    /// feed always records the intent.
    pub fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut state = self.state.write();
        if state.log(collection, key).is_none() {
            return Ok(false);
        }
        let transaction_id = state.next_transaction_id();
        if let Some(log) = state
            .collections
            .get_mut(collection)
            .and_then(|logs| logs.get_mut(key))
        {
            log.append(key, Value::Null, transaction_id);
        }
        self.persist(&state);
        Ok(true)
    }

    /// Hard-remove a key's entire history. The rollback watermark advances
    /// to the erased log's last transaction id; no tombstone is written,
    /// and a collection left empty is removed. Returns false when the key
    /// has no log.
    pub fn evict(&self, collection: &str, key: &str) -> Result<bool> {
        let mut state = self.state.write();
        let last_txid = match state.log(collection, key) {
            Some(log) => log.last().map(|record| record.transaction_id),
            None => return Ok(false),
        };

        if let Some(txid) = last_txid {
            if txid > state.highest_removed_tombstone_id {
                state.highest_removed_tombstone_id = txid;
            }
        }

        let mut remove_collection = false;
        if let Some(logs) = state.collections.get_mut(collection) {
            logs.remove(key);
            remove_collection = logs.is_empty();
        }
        if remove_collection {
            state.collections.remove(collection);
        }

        self.persist(&state);
        Ok(true)
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Fetch a record: the latest live one, or an exact version. Absent
    /// collection/key, an out-of-range version, or a tombstone at the
    /// requested position all yield `None`.
    pub fn get(&self, collection: &str, key: &str, version: Option<u64>) -> Option<Document> {
        let state = self.state.read();
        let log = state.log(collection, key)?;
        let record = match version {
            None => log.latest_live(),
            Some(v) => log.at_version(v),
        };
        record.cloned()
    }

    /// Every key of a collection: full history, or only the latest live
    /// record when `latest_only` (tombstoned keys omitted). An unknown
    /// collection yields an empty listing.
    pub fn list_documents(&self, collection: &str, latest_only: bool) -> DocumentListing {
        let state = self.state.read();
        let logs = state.collections.get(collection);
        if latest_only {
            let mut latest = HashMap::new();
            if let Some(logs) = logs {
                for (key, log) in logs {
                    if let Some(record) = log.latest_live() {
                        latest.insert(key.clone(), record.clone());
                    }
                }
            }
            DocumentListing::Latest(latest)
        } else {
            let mut full = HashMap::new();
            if let Some(logs) = logs {
                for (key, log) in logs {
                    full.insert(key.clone(), log.records().to_vec());
                }
            }
            DocumentListing::Full(full)
        }
    }

    /// As `list_documents`, but each log is filtered by the predicate
    /// first; keys with no matching record are omitted. With `latest_only`
    /// the matching record with the highest version is returned - which
    /// may be older than the key's true latest.
    pub fn query_documents(
        &self,
        collection: &str,
        where_clause: &str,
        latest_only: bool,
    ) -> Result<DocumentListing> {
        let predicate = Predicate::parse(where_clause)?;
        let state = self.state.read();
        let logs = state.collections.get(collection);

        if latest_only {
            let mut latest = HashMap::new();
            if let Some(logs) = logs {
                for (key, log) in logs {
                    let best = log
                        .records()
                        .iter()
                        .filter(|record| predicate.matches(record))
                        .max_by_key(|record| record.version);
                    if let Some(record) = best {
                        latest.insert(key.clone(), record.clone());
                    }
                }
            }
            Ok(DocumentListing::Latest(latest))
        } else {
            let mut full = HashMap::new();
            if let Some(logs) = logs {
                for (key, log) in logs {
                    let matching: Vec<Document> = log
                        .records()
                        .iter()
                        .filter(|record| predicate.matches(record))
                        .cloned()
                        .collect();
                    if !matching.is_empty() {
                        full.insert(key.clone(), matching);
                    }
                }
            }
            Ok(DocumentListing::Full(full))
        }
    }

    // ========================================================================
    // CHANGE FEED
    // ========================================================================

    /// Ordered changes with `transaction_id > start`, optionally filtered
    /// by predicate and collection, truncated to `limit`. The result is
    /// sorted strictly by ascending transaction id - ties are impossible
    /// by construction - and forms a prefix of the full post-`start`
    /// sequence under the chosen filters.
    ///
    /// Rollback guard: a cursor below the rollback watermark means at
    /// least one record in `(start, watermark]` was discarded and cannot
    /// be replayed. The caller gets an empty batch flagged
    /// `needs_rollback` and must rebuild from a full read before resuming
    /// at the reported transaction id.
    pub fn get_changes_after(
        &self,
        start: u64,
        limit: usize,
        where_clause: Option<&str>,
        collection: Option<&str>,
    ) -> Result<ChangeBatch> {
        let predicate = match where_clause {
            Some(clause) => Some(Predicate::parse(clause)?),
            None => None,
        };

        let state = self.state.read();
        if start < state.highest_removed_tombstone_id {
            return Ok(ChangeBatch::rollback(state.current_transaction_id));
        }

        let mut changes: Vec<ChangeEvent> = Vec::new();
        for (name, logs) in &state.collections {
            if let Some(wanted) = collection {
                if name != wanted {
                    continue;
                }
            }
            for log in logs.values() {
                for record in log.records() {
                    if record.transaction_id <= start {
                        continue;
                    }
                    if let Some(predicate) = &predicate {
                        if !predicate.matches(record) {
                            continue;
                        }
                    }
                    changes.push(ChangeEvent::new(record.clone()));
                }
            }
        }

        changes.sort_by_key(|change| change.document.transaction_id);
        changes.truncate(limit);

        Ok(ChangeBatch {
            changes,
            needs_rollback: false,
            last_transaction_id: state.current_transaction_id,
        })
    }

    // ========================================================================
    // GARBAGE COLLECTION
    // ========================================================================

    /// Prune old versions from every log of every collection: keep at most
    /// `max_versions` newest records per key, then drop retained records
    /// older than `max_age_seconds` when given. Every removed tombstone
    /// advances the rollback watermark to its transaction id.
    ///
    /// Logs or collections left empty stay in place; the read paths treat
    /// an empty log as an absent key. Returns the number of records
    /// removed.
    pub fn garbage_collect(
        &self,
        max_versions: usize,
        max_age_seconds: Option<f64>,
    ) -> Result<usize> {
        let now = now_seconds();
        let mut state = self.state.write();

        let mut removed_count = 0;
        let mut watermark = state.highest_removed_tombstone_id;
        for logs in state.collections.values_mut() {
            for log in logs.values_mut() {
                let removed = log.prune(max_versions, now, max_age_seconds);
                for record in &removed {
                    if record.is_tombstone() && record.transaction_id > watermark {
                        watermark = record.transaction_id;
                    }
                }
                removed_count += removed.len();
            }
        }
        state.highest_removed_tombstone_id = watermark;

        if removed_count > 0 {
            log_info!(
                "garbage collected {} record(s), watermark at {}",
                removed_count,
                watermark
            );
        }
        self.persist(&state);
        Ok(removed_count)
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Last transaction id handed out; 0 before the first write.
    pub fn current_transaction_id(&self) -> u64 {
        self.state.read().current_transaction_id
    }

    /// Highest transaction id of any record discarded from the store.
    pub fn rollback_watermark(&self) -> u64 {
        self.state.read().highest_removed_tombstone_id
    }

    /// Collection names, sorted for stable output.
    pub fn collection_names(&self) -> Vec<String> {
        let state = self.state.read();
        let mut names: Vec<String> = state.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Operational statistics as JSON: per-collection key/record counts
    /// plus the id counter and the rollback watermark.
    pub fn stats(&self) -> Value {
        let state = self.state.read();
        let mut collections = serde_json::Map::new();
        for (name, logs) in &state.collections {
            let records: usize = logs.values().map(|log| log.len()).sum();
            collections.insert(
                name.clone(),
                serde_json::json!({"keys": logs.len(), "records": records}),
            );
        }
        serde_json::json!({
            "collections": collections,
            "current_transaction_id": state.current_transaction_id,
            "highest_removed_tombstone_id": state.highest_removed_tombstone_id,
        })
    }

    /// Serialise the whole store to the backend, under the write guard.
    /// Save failures are logged, not surfaced (the in-memory state is
    /// already updated and remains authoritative).
    fn persist(&self, state: &StoreState) {
        let snapshot = state.to_snapshot();
        if let Err(err) = self.backend.lock().save(&snapshot) {
            log_warn!("failed to persist snapshot: {}", err);
        }
    }
}

// tidebase-core/src/version_log.rs
// Per-(collection, key) append-only version log

use serde_json::Value;

use crate::document::Document;

/// Ordered sequence of records for one key.
///
/// Versions start at 1 and are strictly increasing; transaction ids are
/// strictly increasing because a log only ever appends. After garbage
/// collection has pruned a prefix the remaining versions stay dense among
/// themselves and new appends continue from the last surviving version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionLog {
    records: Vec<Document>,
}

impl VersionLog {
    pub fn new() -> Self {
        VersionLog { records: Vec::new() }
    }

    /// Rebuild a log from persisted records (snapshot load path).
    pub(crate) fn from_records(records: Vec<Document>) -> Self {
        VersionLog { records }
    }

    /// Append a new record with the next version and the given transaction
    /// id. The id must come from the store's allocator, exactly once per
    /// append, under the write lock.
    pub fn append(&mut self, key: &str, value: Value, transaction_id: u64) -> Document {
        let version = self.records.last().map_or(0, |record| record.version) + 1;
        let record = Document::new(key.to_string(), value, version, transaction_id);
        self.records.push(record.clone());
        record
    }

    /// The last record, unless it is a tombstone.
    pub fn latest_live(&self) -> Option<&Document> {
        match self.records.last() {
            Some(record) if !record.is_tombstone() => Some(record),
            _ => None,
        }
    }

    /// Linear scan for an exact version; a tombstone hides the result.
    pub fn at_version(&self, version: u64) -> Option<&Document> {
        self.records
            .iter()
            .find(|record| record.version == version)
            .filter(|record| !record.is_tombstone())
    }

    /// The last record, tombstone or not.
    pub fn last(&self) -> Option<&Document> {
        self.records.last()
    }

    pub fn records(&self) -> &[Document] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply a retention policy: keep at most `max_versions` newest
    /// records, then drop retained records older than `max_age_seconds`
    /// relative to `now`. Returns the removed records so the caller can
    /// advance the rollback watermark for discarded tombstones.
    pub(crate) fn prune(
        &mut self,
        max_versions: usize,
        now: f64,
        max_age_seconds: Option<f64>,
    ) -> Vec<Document> {
        // Should already be sorted; a log only appends
        self.records.sort_by_key(|record| record.version);

        let mut removed = Vec::new();
        if self.records.len() > max_versions {
            let split = self.records.len() - max_versions;
            removed.extend(self.records.drain(..split));
        }

        if let Some(max_age) = max_age_seconds {
            let mut kept = Vec::with_capacity(self.records.len());
            for record in self.records.drain(..) {
                if now - record.timestamp > max_age {
                    removed.push(record);
                } else {
                    kept.push(record);
                }
            }
            self.records = kept;
        }

        removed
    }
}

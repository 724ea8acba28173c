// tidebase-core/src/lib.rs
// Core engine for TideBase - versioned document store with a change feed
//
// Writes append immutable records carrying globally increasing transaction
// ids; readers fetch historical versions, filter collections with a
// single-clause predicate language, or tail the change feed from the last
// transaction id they observed. Deletions are soft (tombstones stay
// visible on the feed); eviction is hard and advances a rollback watermark
// that tells stale feed readers to rebuild.

pub mod changes;
pub mod document;
pub mod error;
pub mod logging;
pub mod query;
pub mod storage;
pub mod store;
pub mod value_utils;
pub mod version_log;

// Public exports
pub use changes::{ChangeBatch, ChangeEvent};
pub use document::{Document, Operation};
pub use error::{Result, TideBaseError};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use query::Predicate;
pub use storage::{FileSnapshot, MemorySnapshot, Snapshot, SnapshotBackend};
pub use store::{DocumentListing, Store};

// Integration tests for the TideBase engine
use serde_json::{json, Value};
use tempfile::TempDir;
use tidebase_core::{DocumentListing, Operation, Store, TideBaseError};

#[test]
fn test_basic_upsert_and_versioning() {
    let store = Store::in_memory();

    let first = store.upsert("users", "u1", json!({"n": "A"})).unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.transaction_id, 1);
    assert_eq!(first.operation(), Operation::Insert);

    let second = store.upsert("users", "u1", json!({"n": "B"})).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.transaction_id, 2);
    assert_eq!(second.operation(), Operation::Update);

    let latest = store.get("users", "u1", None).unwrap();
    assert_eq!(latest.value, json!({"n": "B"}));
    assert_eq!(latest.version, 2);

    let old = store.get("users", "u1", Some(1)).unwrap();
    assert_eq!(old.value, json!({"n": "A"}));
}

#[test]
fn test_tombstone_and_feed() {
    let store = Store::in_memory();
    store.upsert("c", "k", json!({"x": 1})).unwrap();
    assert!(store.delete("c", "k").unwrap());

    assert!(store.get("c", "k", None).is_none());

    let batch = store.get_changes_after(0, 10, None, None).unwrap();
    assert!(!batch.needs_rollback);
    assert_eq!(batch.changes.len(), 2);

    assert_eq!(batch.changes[0].document.transaction_id, 1);
    assert_eq!(batch.changes[0].operation, Operation::Insert);

    assert_eq!(batch.changes[1].document.transaction_id, 2);
    assert_eq!(batch.changes[1].operation, Operation::Delete);
    assert_eq!(batch.changes[1].document.value, Value::Null);
}

#[test]
fn test_predicate_filter_on_collection() {
    let store = Store::in_memory();
    store.upsert("users", "u1", json!({"age": 30})).unwrap();
    store.upsert("users", "u2", json!({"age": 20})).unwrap();
    store.upsert("users", "u3", json!({"age": 40})).unwrap();

    let listing = store
        .query_documents("users", "value.age > 25", true)
        .unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.contains_key("u1"));
    assert!(!listing.contains_key("u2"));
    assert!(listing.contains_key("u3"));
}

#[test]
fn test_in_list_matches_quoted_strings() {
    let store = Store::in_memory();
    store.upsert("c", "a", json!({"s": "active"})).unwrap();
    store.upsert("c", "b", json!({"s": "pending"})).unwrap();
    store.upsert("c", "c", json!({"s": "off"})).unwrap();

    let listing = store
        .query_documents("c", "value.s IN ('active','pending')", true)
        .unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.contains_key("a"));
    assert!(listing.contains_key("b"));
    assert!(!listing.contains_key("c"));
}

#[test]
fn test_eviction_forces_rollback() {
    let store = Store::in_memory();

    store.upsert("c", "k", json!(1)).unwrap(); // txid 1; reader cursor stops here
    store.upsert("c", "k", json!(2)).unwrap(); // txid 2
    store.upsert("c", "k", json!(3)).unwrap(); // txid 3

    // GC drops the two oldest live versions; no tombstone was discarded
    let removed = store.garbage_collect(1, None).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.rollback_watermark(), 0);

    // The delete lands as txid 4; GC keeps only the tombstone
    assert!(store.delete("c", "k").unwrap());
    let removed = store.garbage_collect(1, None).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.rollback_watermark(), 0);

    // Eviction discards the tombstone and moves the watermark to 4
    assert!(store.evict("c", "k").unwrap());
    assert_eq!(store.rollback_watermark(), 4);

    // A reader whose cursor predates the watermark must rebuild
    let batch = store.get_changes_after(1, 10, None, None).unwrap();
    assert!(batch.needs_rollback);
    assert!(batch.changes.is_empty());
    assert_eq!(batch.last_transaction_id, 4);
}

#[test]
fn test_feed_orders_across_keys_by_txid() {
    let store = Store::in_memory();
    store.upsert("a", "x", json!(1)).unwrap(); // txid 1
    store.upsert("b", "y", json!(2)).unwrap(); // txid 2
    store.upsert("a", "x", json!(3)).unwrap(); // txid 3

    let batch = store.get_changes_after(0, 10, None, None).unwrap();
    let txids: Vec<u64> = batch
        .changes
        .iter()
        .map(|c| c.document.transaction_id)
        .collect();
    assert_eq!(txids, vec![1, 2, 3]);
}

#[test]
fn test_upsert_null_value_acts_as_tombstone() {
    // Callers should use delete, but a null upsert is accepted
    let store = Store::in_memory();
    store.upsert("c", "k", Value::Null).unwrap();
    assert!(store.get("c", "k", None).is_none());

    let batch = store.get_changes_after(0, 10, None, None).unwrap();
    assert_eq!(batch.changes[0].operation, Operation::Delete);
}

#[test]
fn test_query_full_history_keeps_all_matches() {
    let store = Store::in_memory();
    store.upsert("c", "k", json!({"n": 5})).unwrap();
    store.upsert("c", "k", json!({"n": 1})).unwrap();
    store.upsert("c", "k", json!({"n": 7})).unwrap();

    let listing = store.query_documents("c", "value.n >= 5", false).unwrap();
    match listing {
        DocumentListing::Full(map) => {
            let versions: Vec<u64> = map["k"].iter().map(|r| r.version).collect();
            assert_eq!(versions, vec![1, 3]);
        }
        _ => panic!("expected full listing"),
    }
}

#[test]
fn test_query_on_unknown_collection_is_empty() {
    let store = Store::in_memory();
    let listing = store
        .query_documents("nope", "value.x = 1", false)
        .unwrap();
    assert!(listing.is_empty());
}

#[test]
fn test_is_null_matches_tombstones_and_missing_fields() {
    let store = Store::in_memory();
    store.upsert("c", "a", json!({"x": 1})).unwrap();
    store.upsert("c", "b", json!({"y": 2})).unwrap();
    store.upsert("c", "t", json!({"x": 3})).unwrap();
    store.delete("c", "t").unwrap();

    let listing = store.query_documents("c", "value.x IS NULL", true).unwrap();
    assert!(!listing.contains_key("a"));
    assert!(listing.contains_key("b"));
    // The tombstone has a null value, so every path resolves to null
    assert!(listing.contains_key("t"));
}

#[test]
fn test_between_query() {
    let store = Store::in_memory();
    store.upsert("c", "a", json!({"n": 10})).unwrap();
    store.upsert("c", "b", json!({"n": 20})).unwrap();
    store.upsert("c", "c", json!({"n": 30})).unwrap();

    let listing = store
        .query_documents("c", "value.n BETWEEN 10 AND 20", true)
        .unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.contains_key("a"));
    assert!(listing.contains_key("b"));
}

#[test]
fn test_invalid_query_carries_clause() {
    let store = Store::in_memory();
    let err = store
        .query_documents("c", "value.a > 1 AND value.b < 2", false)
        .unwrap_err();
    match err {
        TideBaseError::InvalidQuery(msg) => assert!(msg.contains("value.a > 1")),
        other => panic!("expected InvalidQuery, got {:?}", other),
    }
}

#[test]
fn test_persistence_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.json");

    {
        let store = Store::open(&path);
        store.upsert("users", "u1", json!({"n": "A"})).unwrap();
        store.upsert("users", "u1", json!({"n": "B"})).unwrap();
        store.upsert("orders", "o1", json!({"total": 9})).unwrap();
        store.delete("orders", "o1").unwrap();
    }

    let store = Store::open(&path);
    assert_eq!(store.current_transaction_id(), 4);

    let latest = store.get("users", "u1", None).unwrap();
    assert_eq!(latest.value, json!({"n": "B"}));
    assert_eq!(store.get("users", "u1", Some(1)).unwrap().value, json!({"n": "A"}));
    assert!(store.get("orders", "o1", None).is_none());

    // New writes continue the id sequence
    let next = store.upsert("users", "u2", json!({"n": "C"})).unwrap();
    assert_eq!(next.transaction_id, 5);
}

#[test]
fn test_watermark_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.json");

    {
        let store = Store::open(&path);
        store.upsert("c", "k", json!(1)).unwrap();
        store.upsert("c", "other", json!(2)).unwrap();
        store.evict("c", "k").unwrap();
        assert_eq!(store.rollback_watermark(), 1);
    }

    let store = Store::open(&path);
    assert_eq!(store.rollback_watermark(), 1);

    // Stale cursors still trigger a rollback after the restart
    let batch = store.get_changes_after(0, 10, None, None).unwrap();
    assert!(batch.needs_rollback);
}

#[test]
fn test_corrupt_snapshot_resets_to_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.json");
    std::fs::write(&path, b"definitely not json").unwrap();

    let store = Store::open(&path);
    assert_eq!(store.current_transaction_id(), 0);
    assert!(store.collection_names().is_empty());

    // The store is usable and persists over the corrupt file
    store.upsert("c", "k", json!(1)).unwrap();
    drop(store);
    let store = Store::open(&path);
    assert!(store.get("c", "k", None).is_some());
}

#[test]
fn test_feed_after_gc_only_shows_surviving_records() {
    let store = Store::in_memory();
    for i in 0..4 {
        store.upsert("c", "k", json!(i)).unwrap(); // txids 1..=4
    }
    store.garbage_collect(2, None).unwrap();

    // Cursor 2 does not predate any discarded tombstone (none existed)
    let batch = store.get_changes_after(2, 10, None, None).unwrap();
    assert!(!batch.needs_rollback);
    let txids: Vec<u64> = batch
        .changes
        .iter()
        .map(|c| c.document.transaction_id)
        .collect();
    assert_eq!(txids, vec![3, 4]);
}

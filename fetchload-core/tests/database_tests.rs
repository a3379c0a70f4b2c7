// Tests for the SQLite store

use fetchload_core::data::{RUNS_TABLE, RunMeta, Store, WriteMode};
use fetchload_core::error::StorageError;
use fetchload_core::record::Record;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn create_test_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = Store::open(&db_path).unwrap();
    (temp_dir, store)
}

fn records(value: Value) -> Vec<Record> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn meta(records_decoded: usize) -> RunMeta {
    RunMeta {
        run_id: next_run_id(),
        url: "http://example.com/posts".to_string(),
        records_decoded,
        started_at: 1_700_000_000,
    }
}

fn next_run_id() -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("run-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_store_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let store = Store::open(&db_path);
    assert!(store.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_store_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dir").join("test.db");

    let _store = Store::open(&db_path).unwrap();
    assert!(Store::exists(&db_path));
}

#[test]
fn test_store_remove() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let store = Store::open(&db_path).unwrap();
    drop(store);
    assert!(Store::exists(&db_path));

    Store::remove(&db_path).unwrap();
    assert!(!Store::exists(&db_path));
}

#[test]
fn test_run_log_table_exists() {
    let (_temp_dir, store) = create_test_store();
    assert!(store.table_exists(RUNS_TABLE).unwrap());
    assert!(!store.table_exists("posts").unwrap());
}

// ============================================================================
// Append Tests
// ============================================================================

#[test]
fn test_write_records_creates_table() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([{"id": 1, "value": "a"}, {"id": 2, "value": "b"}]));

    let written = store
        .write_records("items", &batch, &WriteMode::Append, &meta(2))
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.count_rows("items").unwrap(), 2);
    assert_eq!(store.table_columns("items").unwrap(), vec!["id", "value"]);
}

#[test]
fn test_write_records_values_round_trip() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([
        {"id": 1, "score": 2.5, "ok": true, "tags": ["x", "y"], "note": null}
    ]));

    store
        .write_records("things", &batch, &WriteMode::Append, &meta(1))
        .unwrap();

    let (id, score, ok, tags, note): (i64, f64, i64, String, Option<String>) = store
        .get_connection()
        .query_row(
            "SELECT id, score, ok, tags, note FROM things",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .unwrap();

    assert_eq!(id, 1);
    assert_eq!(score, 2.5);
    assert_eq!(ok, 1);
    assert_eq!(tags, r#"["x","y"]"#);
    assert_eq!(note, None);
}

#[test]
fn test_write_records_appends_on_rerun() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([{"id": 1, "value": "a"}, {"id": 2, "value": "b"}]));

    store
        .write_records("items", &batch, &WriteMode::Append, &meta(2))
        .unwrap();
    store
        .write_records("items", &batch, &WriteMode::Append, &meta(2))
        .unwrap();

    assert_eq!(store.count_rows("items").unwrap(), 4);
}

#[test]
fn test_write_records_missing_fields_become_null() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records(
            "items",
            &records(json!([{"id": 1, "value": "a"}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();
    store
        .write_records("items", &records(json!([{"id": 2}])), &WriteMode::Append, &meta(1))
        .unwrap();

    let nulls: i64 = store
        .get_connection()
        .query_row("SELECT COUNT(*) FROM items WHERE value IS NULL", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(nulls, 1);
}

#[test]
fn test_write_records_schema_mismatch_writes_nothing() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records(
            "items",
            &records(json!([{"id": 1, "value": "a"}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();

    let err = store
        .write_records(
            "items",
            &records(json!([{"id": 2, "value": "b"}, {"id": 3, "surprise": 1}])),
            &WriteMode::Append,
            &meta(2),
        )
        .unwrap_err();

    match err {
        StorageError::SchemaMismatch { table, column } => {
            assert_eq!(table, "items");
            assert_eq!(column, "surprise");
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert_eq!(store.count_rows("items").unwrap(), 1);
    assert_eq!(store.recent_runs(10).unwrap().len(), 1);
}

#[test]
fn test_write_empty_batch_creates_no_table() {
    let (_temp_dir, mut store) = create_test_store();

    let written = store
        .write_records("empty", &[], &WriteMode::Append, &meta(0))
        .unwrap();

    assert_eq!(written, 0);
    assert!(!store.table_exists("empty").unwrap());
}

#[test]
fn test_write_records_rejects_run_log_table() {
    let (_temp_dir, mut store) = create_test_store();
    let result = store.write_records(
        RUNS_TABLE,
        &records(json!([{"id": 1}])),
        &WriteMode::Append,
        &meta(1),
    );
    assert!(matches!(result, Err(StorageError::InvalidIdentifier(_))));

    let result = store.write_records(
        "Fetchload_Runs",
        &records(json!([{"id": 1}])),
        &WriteMode::Append,
        &meta(1),
    );
    assert!(matches!(result, Err(StorageError::InvalidIdentifier(_))));
}

#[test]
fn test_write_records_quotes_odd_names() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([{"first name": "Ada", "select": 1, "we\"ird": "q"}]));

    let written = store
        .write_records("my table", &batch, &WriteMode::Append, &meta(1))
        .unwrap();

    assert_eq!(written, 1);
    assert_eq!(
        store.table_columns("my table").unwrap(),
        vec!["first name", "select", "we\"ird"]
    );
}

#[test]
fn test_empty_objects_into_existing_table_insert_null_rows() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records(
            "items",
            &records(json!([{"id": 1, "value": "a"}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();

    let written = store
        .write_records("items", &records(json!([{}, {}])), &WriteMode::Append, &meta(2))
        .unwrap();

    assert_eq!(written, 2);
    let nulls: i64 = store
        .get_connection()
        .query_row(
            "SELECT COUNT(*) FROM items WHERE id IS NULL AND value IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(nulls, 2);
}

#[test]
fn test_empty_objects_without_table_fail_cleanly() {
    let (_temp_dir, mut store) = create_test_store();

    let err = store
        .write_records("items", &records(json!([{}])), &WriteMode::Append, &meta(1))
        .unwrap_err();

    assert!(matches!(err, StorageError::NoColumns { ref table } if table == "items"));
    assert!(!store.table_exists("items").unwrap());
    assert!(store.recent_runs(10).unwrap().is_empty());
}

#[test]
fn test_keys_differing_in_case_share_a_column() {
    let (_temp_dir, mut store) = create_test_store();

    let written = store
        .write_records(
            "people",
            &records(json!([{"Name": "a"}, {"name": "b"}])),
            &WriteMode::Append,
            &meta(2),
        )
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.table_columns("people").unwrap(), vec!["Name"]);
    let filled: i64 = store
        .get_connection()
        .query_row("SELECT COUNT(*) FROM people WHERE Name IS NOT NULL", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(filled, 2);
}

#[test]
fn test_existing_column_matched_ignoring_case() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records("t", &records(json!([{"ID": 1}])), &WriteMode::Append, &meta(1))
        .unwrap();

    let written = store
        .write_records("t", &records(json!([{"id": 2}])), &WriteMode::Append, &meta(1))
        .unwrap();

    assert_eq!(written, 1);
    let max: i64 = store
        .get_connection()
        .query_row("SELECT MAX(ID) FROM t", [], |row| row.get(0))
        .unwrap();
    assert_eq!(max, 2);
}

// ============================================================================
// Upsert Tests
// ============================================================================

#[test]
fn test_upsert_updates_existing_rows() {
    let (_temp_dir, mut store) = create_test_store();
    let mode = WriteMode::Upsert {
        merge_column: "id".to_string(),
    };

    store
        .write_records(
            "posts",
            &records(json!([{"id": 1, "title": "old"}, {"id": 2, "title": "two"}])),
            &mode,
            &meta(2),
        )
        .unwrap();
    let written = store
        .write_records(
            "posts",
            &records(json!([{"id": 1, "title": "new"}, {"id": 3, "title": "three"}])),
            &mode,
            &meta(2),
        )
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.count_rows("posts").unwrap(), 3);

    let title: String = store
        .get_connection()
        .query_row("SELECT title FROM posts WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(title, "new");
}

#[test]
fn test_upsert_on_existing_append_table() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records(
            "posts",
            &records(json!([{"id": 1, "title": "a"}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();

    let mode = WriteMode::Upsert {
        merge_column: "id".to_string(),
    };
    store
        .write_records(
            "posts",
            &records(json!([{"id": 1, "title": "b"}])),
            &mode,
            &meta(1),
        )
        .unwrap();

    assert_eq!(store.count_rows("posts").unwrap(), 1);
}

#[test]
fn test_upsert_merge_column_matched_ignoring_case() {
    let (_temp_dir, mut store) = create_test_store();
    let mode = WriteMode::Upsert {
        merge_column: "id".to_string(),
    };

    store
        .write_records(
            "posts",
            &records(json!([{"ID": 1, "title": "old"}])),
            &mode,
            &meta(1),
        )
        .unwrap();
    store
        .write_records(
            "posts",
            &records(json!([{"id": 1, "Title": "new"}])),
            &mode,
            &meta(1),
        )
        .unwrap();

    assert_eq!(store.count_rows("posts").unwrap(), 1);
    let title: String = store
        .get_connection()
        .query_row("SELECT title FROM posts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(title, "new");
}

#[test]
fn test_upsert_requires_merge_column() {
    let (_temp_dir, mut store) = create_test_store();
    let mode = WriteMode::Upsert {
        merge_column: "id".to_string(),
    };

    let err = store
        .write_records(
            "posts",
            &records(json!([{"id": 1}, {"title": "no id"}])),
            &mode,
            &meta(2),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::MissingMergeColumn { index: 1, .. }
    ));
    assert!(!store.table_exists("posts").unwrap());
}

// ============================================================================
// Run Log and Maintenance Tests
// ============================================================================

#[test]
fn test_recent_runs() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([{"id": 1}, {"id": 2}, {"id": 3}]));

    store
        .write_records("items", &batch, &WriteMode::Append, &meta(3))
        .unwrap();

    let runs = store.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].table_name, "items");
    assert_eq!(runs[0].records_decoded, 3);
    assert_eq!(runs[0].rows_written, 3);
    assert_eq!(runs[0].mode, "append");
    assert_eq!(runs[0].url, "http://example.com/posts");
}

#[test]
fn test_recent_runs_limit() {
    let (_temp_dir, mut store) = create_test_store();
    let batch = records(json!([{"id": 1}]));
    for _ in 0..5 {
        store
            .write_records("items", &batch, &WriteMode::Append, &meta(1))
            .unwrap();
    }

    assert_eq!(store.recent_runs(3).unwrap().len(), 3);
}

#[test]
fn test_drop_table() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .write_records(
            "items",
            &records(json!([{"id": 1}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();

    assert!(store.drop_table("items").unwrap());
    assert!(!store.table_exists("items").unwrap());
    assert!(!store.drop_table("items").unwrap());
}

#[test]
fn test_drop_run_log_is_refused() {
    let (_temp_dir, store) = create_test_store();
    assert!(store.drop_table(RUNS_TABLE).is_err());
    assert!(store.drop_table(&RUNS_TABLE.to_uppercase()).is_err());
    assert!(store.table_exists(RUNS_TABLE).unwrap());
}

#[test]
fn test_in_memory_store() {
    let mut store = Store::open_in_memory().unwrap();
    let written = store
        .write_records(
            "items",
            &records(json!([{"id": 1}])),
            &WriteMode::Append,
            &meta(1),
        )
        .unwrap();
    assert_eq!(written, 1);
}

// crates/error-archive-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Error Store Tests
// Description: Contract and integrity tests for the SQLite error store.
// Purpose: Validate ordering, scoping, lazy schema setup, path safety, and
//          corruption detection.
// ============================================================================

//! ## Overview
//! Tests for the `SQLite` error store:
//! - Newest-first paging with total counts and application scoping
//! - In-process filtering over stored envelopes
//! - Single schema check under concurrent first use
//! - Schema creation switch, version mismatch, and corrupt rows

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::PathBuf;
use std::sync::Arc;

use error_archive_core::CallerInfo;
use error_archive_core::CancelSignal;
use error_archive_core::CaptureOptions;
use error_archive_core::CapturedException;
use error_archive_core::EnvelopeBuilder;
use error_archive_core::EnvelopeDraft;
use error_archive_core::ErrorEnvelope;
use error_archive_core::ErrorId;
use error_archive_core::ErrorLog;
use error_archive_core::ErrorStore;
use error_archive_core::FilterChain;
use error_archive_core::PropertyFilter;
use error_archive_core::RequestContext;
use error_archive_core::RequestLog;
use error_archive_core::SearchFilter;
use error_archive_core::StoreError;
use error_archive_core::core::LogMessage;
use error_archive_store_sqlite::SQLITE_STORE_NAME;
use error_archive_store_sqlite::SqliteErrorStore;
use error_archive_store_sqlite::SqliteStoreConfig;
use error_archive_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Database path inside a temp dir.
fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("errors.sqlite")
}

/// Opens a store with default settings.
fn open(dir: &TempDir) -> SqliteErrorStore {
    SqliteErrorStore::new(SqliteStoreConfig::new(db_path(dir))).unwrap()
}

/// Builds an envelope for `application` at `seconds` after the epoch.
fn envelope(application: &str, type_name: &str, seconds: i64) -> ErrorEnvelope {
    let mut draft = EnvelopeDraft::new(type_name, format!("{type_name} at {seconds}"));
    draft.application = application.to_string();
    draft.time = Some(OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds));
    draft.finish()
}

/// Envelope carrying every optional collection, merged headers, and caller detail.
fn full_envelope(application: &str) -> ErrorEnvelope {
    let request_log = Arc::new(RequestLog::new());
    request_log.add_message(LogMessage {
        time: OffsetDateTime::now_utc(),
        level: Some("warn".to_string()),
        scope: Some("orders".to_string()),
        message: "retrying".to_string(),
        exception: None,
    });
    let _ = request_log.begin_sql("orders", "SELECT * FROM orders WHERE id = @id");
    request_log.log_parameters(&[("order_id", serde_json::json!(7)), ("note", serde_json::json!("rush"))], "OrderService", "load");
    let request = RequestContext::new("POST", "/orders")
        .with_header("Accept", "text/html")
        .with_header("Accept", "application/json")
        .with_cookie("session", "abc")
        .with_query("page", "2")
        .with_form("quantity", "3")
        .with_user("alice")
        .with_log(request_log);
    let exception = CapturedException::new("IoError", "disk full").with_source("storage").with_caller(CallerInfo {
        member: Some("save_order".to_string()),
        file: "src/orders.rs".to_string(),
        line: 42,
    });
    let options = CaptureOptions {
        host_name: Some("web-01".to_string()),
        ..CaptureOptions::default()
    };
    EnvelopeBuilder::new(options).build(Some(&exception), Some(&request), None).with_application(application)
}

/// Asserts that `envelope` carries every optional part.
fn assert_fully_populated(envelope: &ErrorEnvelope) {
    assert!(envelope.detail().starts_with("# caller: save_order in src/orders.rs:42"));
    assert_eq!(envelope.server_variables().get("Header_Accept"), Some("text/html,application/json"));
    assert!(envelope.cookies().is_some());
    assert!(envelope.query_string().is_some());
    assert!(envelope.form().is_some());
    assert!(envelope.messages().is_some());
    assert!(envelope.sql_log().is_some());
    assert!(envelope.params().is_some());
}

/// Appends and returns the identifier.
async fn append(store: &SqliteErrorStore, application: &str, type_name: &str, seconds: i64) -> ErrorId {
    store.append(&envelope(application, type_name, seconds), &CancelSignal::never()).await.unwrap()
}

// ============================================================================
// SECTION: Contract
// ============================================================================

#[tokio::test]
async fn pages_newest_first_with_total_count() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let first = append(&store, "shop", "T1", 1).await;
    let second = append(&store, "shop", "T2", 2).await;
    let third = append(&store, "shop", "T3", 3).await;
    append(&store, "admin", "T4", 4).await;

    let page = store.get_page("shop", &FilterChain::new(), 0, 10, &CancelSignal::never()).await.unwrap();
    let ids: Vec<ErrorId> = page.records.iter().map(|record| record.id()).collect();
    assert_eq!(page.total_count, 3);
    assert_eq!(ids, vec![third, second, first]);
    assert!(page.records.iter().all(|record| record.store() == SQLITE_STORE_NAME));

    let page = store.get_page("shop", &FilterChain::new(), 2, 5, &CancelSignal::never()).await.unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].id(), first);
}

#[tokio::test]
async fn equal_timestamps_order_by_insertion() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let older = append(&store, "shop", "IoError", 5).await;
    let newer = append(&store, "shop", "IoError", 5).await;

    let page = store.get_page("shop", &FilterChain::new(), 0, 10, &CancelSignal::never()).await.unwrap();

    assert_eq!(page.records[0].id(), newer);
    assert_eq!(page.records[1].id(), older);
}

#[tokio::test]
async fn get_one_is_scoped_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let id = append(&store, "shop", "TimeoutError", 9).await;

    let record = store.get_one("shop", id, &CancelSignal::never()).await.unwrap().unwrap();
    assert_eq!(record.envelope().type_name(), "TimeoutError");
    assert_eq!(record.envelope().message(), "TimeoutError at 9");
    assert_eq!(record.envelope().time(), OffsetDateTime::UNIX_EPOCH + Duration::seconds(9));

    assert!(store.get_one("admin", id, &CancelSignal::never()).await.unwrap().is_none());
    assert!(store.get_one("shop", ErrorId::generate(), &CancelSignal::never()).await.unwrap().is_none());
}

#[tokio::test]
async fn full_envelope_round_trips_field_for_field() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let original = full_envelope("shop");
    assert_fully_populated(&original);

    let id = store.append(&original, &CancelSignal::never()).await.unwrap();
    let record = store.get_one("shop", id, &CancelSignal::never()).await.unwrap().unwrap();
    assert_eq!(record.envelope(), &original);

    let reopened = open(&dir);
    let log = ErrorLog::scoped(Arc::new(reopened), "shop");
    let record = log.get_one(id, &CancelSignal::never()).await.unwrap();
    assert_eq!(record.envelope(), &original);
    assert_eq!(record.store(), SQLITE_STORE_NAME);
}

#[tokio::test]
async fn filters_apply_to_counts_and_pages() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    append(&store, "shop", "IoError", 1).await;
    let timeout = append(&store, "shop", "TimeoutError", 2).await;
    append(&store, "shop", "IoError", 3).await;

    let by_type = FilterChain::new().with(PropertyFilter::parse("type:TimeoutError").unwrap());
    let page = store.get_page("shop", &by_type, 0, 10, &CancelSignal::never()).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].id(), timeout);

    let search = FilterChain::new().with(SearchFilter::new("ioerror at").unwrap());
    let page = store.get_page("shop", &search, 1, 10, &CancelSignal::never()).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let id = append(&open(&dir), "shop", "IoError", 1).await;

    let reopened = open(&dir);
    let record = reopened.get_one("shop", id, &CancelSignal::never()).await.unwrap();

    assert!(record.is_some());
}

#[tokio::test]
async fn cancelled_operations_do_not_touch_the_database() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let cancel = CancelSignal::new();
    cancel.cancel();

    let result = store.append(&envelope("shop", "IoError", 1), &cancel).await;

    assert!(matches!(result, Err(StoreError::Cancelled)));
    assert_eq!(store.schema_checks(), 0);
}

// ============================================================================
// SECTION: Schema
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_checks_schema_once() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut tasks = Vec::new();
    for seconds in 0 .. 100 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.append(&envelope("shop", "IoError", seconds), &CancelSignal::never()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.schema_checks(), 1);
    let page = store.get_page("shop", &FilterChain::new(), 0, 1, &CancelSignal::never()).await.unwrap();
    assert_eq!(page.total_count, 100);
}

#[tokio::test]
async fn missing_table_without_create_fails_appends() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(db_path(&dir));
    config.create_tables = false;
    let store = SqliteErrorStore::new(config).unwrap();

    let result = store.append(&envelope("shop", "IoError", 1), &CancelSignal::never()).await;
    assert!(matches!(result, Err(StoreError::Invalid(_))));

    let log = ErrorLog::scoped(Arc::new(store.clone()), "shop");
    assert!(log.append(envelope("shop", "IoError", 1), &CancelSignal::never()).await.is_none());
    assert_eq!(store.schema_checks(), 2);
}

#[tokio::test]
async fn unsupported_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let connection = Connection::open(db_path(&dir)).unwrap();
    connection
        .execute_batch("CREATE TABLE store_meta (version INTEGER NOT NULL); INSERT INTO store_meta VALUES (99);")
        .unwrap();
    drop(connection);
    let store = open(&dir);

    let result = store.get_page("shop", &FilterChain::new(), 0, 10, &CancelSignal::never()).await;

    assert!(matches!(result, Err(StoreError::Store(message)) if message.contains("99")));
}

#[tokio::test]
async fn corrupt_rows_fail_closed() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    append(&store, "shop", "IoError", 1).await;
    let connection = Connection::open(db_path(&dir)).unwrap();
    connection.execute("UPDATE errors SET envelope_json = ?1", params!["{not json"]).unwrap();
    drop(connection);

    let result = store.get_page("shop", &FilterChain::new(), 0, 10, &CancelSignal::never()).await;

    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

// ============================================================================
// SECTION: Path Safety
// ============================================================================

#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().unwrap();

    let result = SqliteErrorStore::new(SqliteStoreConfig::new(dir.path()));

    assert!(matches!(result, Err(SqliteStoreError::Invalid(message)) if message.contains("directory")));
}

#[test]
fn overlong_components_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a".repeat(300));

    let result = SqliteErrorStore::new(SqliteStoreConfig::new(path));

    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("errors.sqlite");

    SqliteErrorStore::new(SqliteStoreConfig::new(&path)).unwrap();

    assert!(path.parent().unwrap().is_dir());
}

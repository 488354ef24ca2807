// crates/error-archive-notify/tests/notifiers/log_tests.rs
// ============================================================================
// Module: LogNotifier Tests
// Description: Tests for the JSON-lines notifier.
// Purpose: Validate line format and write failure handling.
// Dependencies: error-archive-notify, serde_json
// ============================================================================

//! Exercises [`error_archive_notify::LogNotifier`] and its JSON output.

use error_archive_core::ErrorId;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use error_archive_notify::LogNotifier;
use serde_json::Value;

use super::common::FailingWriter;
use super::common::SharedBuffer;
use super::common::sample_envelope;

/// Tests one JSON line is written per notice.
#[tokio::test]
async fn log_notifier_writes_one_line_per_notice() {
    let buffer = SharedBuffer::new();
    let notifier = LogNotifier::new(buffer.clone());
    let envelope = sample_envelope("IoError", "disk full");
    let id = ErrorId::generate();

    notifier.notify(&Notice { envelope: &envelope, id: Some(id) }).await.unwrap();
    notifier.notify(&Notice { envelope: &envelope, id: None }).await.unwrap();

    let output = buffer.to_string_lossy();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["notifier"], "log");
    assert_eq!(first["id"], id.to_string());
    assert_eq!(first["envelope"]["message"], "disk full");
    let second: Value = serde_json::from_str(lines[1]).unwrap();
    assert!(second["id"].is_null());
}

/// Tests writer failures surface as delivery errors.
#[tokio::test]
async fn log_notifier_reports_write_failures() {
    let notifier = LogNotifier::with_name(FailingWriter, "audit");
    let envelope = sample_envelope("IoError", "disk full");

    let result = notifier.notify(&Notice { envelope: &envelope, id: None }).await;

    assert_eq!(notifier.name(), "audit");
    assert!(matches!(result, Err(NotifyError::Delivery(message)) if message.contains("log write failed")));
}

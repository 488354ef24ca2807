// crates/error-archive-notify/tests/notifiers/callback_tests.rs
// ============================================================================
// Module: CallbackNotifier Tests
// Description: Tests for the closure-backed notifier.
// Purpose: Validate delivery and error propagation.
// Dependencies: error-archive-notify
// ============================================================================

//! Exercises [`error_archive_notify::CallbackNotifier`].

use std::sync::Arc;
use std::sync::Mutex;

use error_archive_core::ErrorId;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use error_archive_notify::CallbackNotifier;

use super::common::sample_envelope;

/// Tests callback notifier passes the notice through.
#[tokio::test]
async fn callback_notifier_receives_notice() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let notifier = CallbackNotifier::new("hook", move |notice: &Notice<'_>| {
        sink.lock().unwrap().push((notice.id, notice.envelope.message().to_string()));
        Ok(())
    });
    let envelope = sample_envelope("IoError", "disk full");
    let id = ErrorId::generate();

    notifier.notify(&Notice { envelope: &envelope, id: Some(id) }).await.unwrap();

    assert_eq!(notifier.name(), "hook");
    assert_eq!(seen.lock().unwrap().clone(), vec![(Some(id), "disk full".to_string())]);
}

/// Tests callback errors are returned unchanged.
#[tokio::test]
async fn callback_notifier_propagates_errors() {
    let notifier =
        CallbackNotifier::new("hook", |_: &Notice<'_>| Err(NotifyError::Delivery("hook offline".to_string())));
    let envelope = sample_envelope("IoError", "disk full");

    let result = notifier.notify(&Notice { envelope: &envelope, id: None }).await;

    assert_eq!(result, Err(NotifyError::Delivery("hook offline".to_string())));
}

// crates/error-archive-notify/tests/notifiers/channel_tests.rs
// ============================================================================
// Module: ChannelNotifier Tests
// Description: Tests for the mpsc-backed notifier.
// Purpose: Validate message contents and full/closed channel handling.
// Dependencies: error-archive-notify, tokio
// ============================================================================

//! Exercises [`error_archive_notify::ChannelNotifier`].

use error_archive_core::ErrorId;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use error_archive_notify::ChannelNotifier;
use error_archive_notify::NoticeMessage;

use super::common::sample_envelope;

/// Tests channel notifier sends an owned message.
#[tokio::test]
async fn channel_notifier_sends_message() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<NoticeMessage>(1);
    let notifier = ChannelNotifier::new(tx);
    let envelope = sample_envelope("IoError", "disk full");
    let id = ErrorId::generate();

    notifier.notify(&Notice { envelope: &envelope, id: Some(id) }).await.unwrap();
    let message = rx.try_recv().unwrap();

    assert_eq!(notifier.name(), "channel");
    assert_eq!(message.envelope, envelope);
    assert_eq!(message.id, Some(id));
}

/// Tests a full channel is a delivery failure.
#[tokio::test]
async fn channel_notifier_reports_full_channel() {
    let (tx, _rx) = tokio::sync::mpsc::channel::<NoticeMessage>(1);
    let notifier = ChannelNotifier::with_name(tx, "queue");
    let envelope = sample_envelope("IoError", "disk full");

    notifier.notify(&Notice { envelope: &envelope, id: None }).await.unwrap();
    let result = notifier.notify(&Notice { envelope: &envelope, id: None }).await;

    assert!(matches!(result, Err(NotifyError::Delivery(message)) if message.contains("full")));
}

/// Tests a closed channel is a delivery failure.
#[tokio::test]
async fn channel_notifier_reports_closed_channel() {
    let (tx, rx) = tokio::sync::mpsc::channel::<NoticeMessage>(4);
    drop(rx);
    let notifier = ChannelNotifier::new(tx);
    let envelope = sample_envelope("IoError", "disk full");

    let result = notifier.notify(&Notice { envelope: &envelope, id: None }).await;

    assert!(matches!(result, Err(NotifyError::Delivery(message)) if message.contains("closed")));
}

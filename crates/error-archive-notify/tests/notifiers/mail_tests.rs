// crates/error-archive-notify/tests/notifiers/mail_tests.rs
// ============================================================================
// Module: MailNotifier Tests
// Description: Tests for mail composition and transport delivery.
// Purpose: Validate subject formatting, recipient parsing, and skipping.
// Dependencies: error-archive-notify, async-trait
// ============================================================================

//! Exercises [`error_archive_notify::MailNotifier`].

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use error_archive_notify::MailMessage;
use error_archive_notify::MailNotifier;
use error_archive_notify::MailPriority;
use error_archive_notify::MailSettings;
use error_archive_notify::MailTransport;

use super::common::sample_envelope;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Transport that records sent messages.
#[derive(Default)]
struct RecordingTransport {
    /// Sent messages.
    sent: Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Transport that always fails.
struct RefusingTransport;

#[async_trait]
impl MailTransport for RefusingTransport {
    async fn send(&self, _message: MailMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp refused".to_string()))
    }
}

/// Settings with recipients.
fn settings() -> MailSettings {
    MailSettings {
        sender: "errors@example.com".to_string(),
        recipients: vec!["ops@example.com; dev@example.com".to_string()],
        cc: vec!["lead@example.com".to_string()],
        priority: MailPriority::High,
        ..MailSettings::default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests the default subject and recipient splitting.
#[tokio::test]
async fn mail_notifier_composes_and_sends() {
    let transport = Arc::new(RecordingTransport::default());
    let notifier = MailNotifier::new(settings(), transport.clone());
    let envelope = sample_envelope("IoError", "disk full");

    notifier.notify(&Notice { envelope: &envelope, id: None }).await.unwrap();

    let sent = transport.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let message = &sent[0];
    assert_eq!(message.subject, "Error (IoError): disk full");
    assert_eq!(message.to, vec!["ops@example.com".to_string(), "dev@example.com".to_string()]);
    assert_eq!(message.cc, vec!["lead@example.com".to_string()]);
    assert_eq!(message.from, "errors@example.com");
    assert_eq!(message.priority, MailPriority::High);
    assert!(message.body.starts_with("IoError: disk full\n"));
    assert!(message.body.contains("Host: web-01"));
    assert!(message.body.contains("stack line 2"));
}

/// Tests custom subject formats and line-break flattening.
#[test]
fn mail_subject_is_single_line() {
    let notifier = MailNotifier::new(
        MailSettings {
            subject_format: "[{1}] {0}".to_string(),
            ..settings()
        },
        Arc::new(RecordingTransport::default()),
    );
    let envelope = sample_envelope("IoError", "disk\r\nfull");

    let message = notifier.compose(&envelope).unwrap();

    assert_eq!(message.subject, "[IoError] disk  full");
}

/// Tests that placeholder text inside the message is not expanded.
#[test]
fn mail_subject_substitutes_in_one_pass() {
    let notifier = MailNotifier::new(
        MailSettings {
            subject_format: "{0} / {1} / {2}".to_string(),
            ..settings()
        },
        Arc::new(RecordingTransport::default()),
    );
    let envelope = sample_envelope("IoError", "template {1} and {0} left alone");

    let message = notifier.compose(&envelope).unwrap();

    assert_eq!(message.subject, "template {1} and {0} left alone / IoError / {2}");
}

/// Tests that no recipients means nothing is sent.
#[tokio::test]
async fn mail_notifier_without_recipients_sends_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let notifier = MailNotifier::with_name(
        MailSettings {
            recipients: vec![" ; ".to_string()],
            ..MailSettings::default()
        },
        transport.clone(),
        "ops-mail",
    );
    let envelope = sample_envelope("IoError", "disk full");

    notifier.notify(&Notice { envelope: &envelope, id: None }).await.unwrap();

    assert_eq!(notifier.name(), "ops-mail");
    assert!(transport.sent.lock().unwrap().is_empty());
}

/// Tests transport failures are returned.
#[tokio::test]
async fn mail_notifier_reports_transport_failures() {
    let notifier = MailNotifier::new(settings(), Arc::new(RefusingTransport));
    let envelope = sample_envelope("IoError", "disk full");

    let result = notifier.notify(&Notice { envelope: &envelope, id: None }).await;

    assert_eq!(result, Err(NotifyError::Delivery("smtp refused".to_string())));
}

// crates/error-archive-notify/src/notifier/mod.rs
// ============================================================================
// Module: Error Archive Notifiers
// Description: Owned notice message and reference notifier implementations.
// Purpose: Deliver archived-error notices to concrete targets.
// Dependencies: error-archive-core
// ============================================================================

//! ## Overview
//! Notifiers receive a borrowed [`error_archive_core::Notice`] for every
//! archived error that was not suppressed. Targets that outlive the call, such
//! as channels, receive an owned [`NoticeMessage`] instead.
//! Invariants:
//! - Delivery errors are reported, never retried here.
//!
//! Security posture: envelopes may carry request data; treat notices as
//! sensitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use error_archive_core::ErrorEnvelope;
use error_archive_core::ErrorId;
use error_archive_core::Notice;

// ============================================================================
// SECTION: Notice Message
// ============================================================================

/// Owned notice emitted by channel-based notifiers.
///
/// # Invariants
/// - `id` is absent exactly when persistence failed.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeMessage {
    /// Archived envelope.
    pub envelope: ErrorEnvelope,
    /// Stored identifier.
    pub id: Option<ErrorId>,
}

impl From<&Notice<'_>> for NoticeMessage {
    fn from(notice: &Notice<'_>) -> Self {
        Self {
            envelope: notice.envelope.clone(),
            id: notice.id,
        }
    }
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod channel;
pub mod log;
pub mod mail;

pub use callback::CallbackNotifier;
pub use channel::ChannelNotifier;
pub use log::LogNotifier;
pub use mail::MailMessage;
pub use mail::MailNotifier;
pub use mail::MailPriority;
pub use mail::MailSettings;
pub use mail::MailTransport;

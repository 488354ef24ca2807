// crates/error-archive-notify/src/lib.rs
// ============================================================================
// Module: Error Archive Notify Library
// Description: Reference notifiers for archived errors.
// Purpose: Deliver notices to callbacks, channels, logs, and mail transports.
// Dependencies: error-archive-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Reference [`error_archive_core::Notifier`] implementations. Each notifier
//! reports failures as [`error_archive_core::NotifyError`] and leaves retry
//! decisions to the host; the capture pipeline isolates them from one another.
//! Invariants:
//! - Notifier names are fixed at construction.
//! - A failed delivery has no partial side effect on the target.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod notifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use notifier::CallbackNotifier;
pub use notifier::ChannelNotifier;
pub use notifier::LogNotifier;
pub use notifier::MailMessage;
pub use notifier::MailNotifier;
pub use notifier::MailPriority;
pub use notifier::MailSettings;
pub use notifier::MailTransport;
pub use notifier::NoticeMessage;

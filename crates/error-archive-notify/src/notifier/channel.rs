// crates/error-archive-notify/src/notifier/channel.rs
// ============================================================================
// Module: Channel Notifier
// Description: Notifier that forwards owned notices over a tokio channel.
// Purpose: Hand notices to a consumer task without blocking capture.
// Dependencies: error-archive-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelNotifier`] sends a [`NoticeMessage`] with `try_send`. A full or
//! closed channel is a delivery failure; the notice is dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::notifier::NoticeMessage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default notifier name.
const DEFAULT_NAME: &str = "channel";

// ============================================================================
// SECTION: Channel Notifier
// ============================================================================

/// Notifier that forwards notices to an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    /// Notifier name.
    name: String,
    /// Channel sender.
    sender: mpsc::Sender<NoticeMessage>,
}

impl ChannelNotifier {
    /// Creates a channel notifier named `channel`.
    #[must_use]
    pub fn new(sender: mpsc::Sender<NoticeMessage>) -> Self {
        Self::with_name(sender, DEFAULT_NAME)
    }

    /// Creates a channel notifier with a custom name.
    #[must_use]
    pub fn with_name(sender: mpsc::Sender<NoticeMessage>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, notice: &Notice<'_>) -> Result<(), NotifyError> {
        self.sender.try_send(NoticeMessage::from(notice)).map_err(|err| match err {
            TrySendError::Full(_) => NotifyError::Delivery("notice channel full".to_string()),
            TrySendError::Closed(_) => NotifyError::Delivery("notice channel closed".to_string()),
        })
    }
}

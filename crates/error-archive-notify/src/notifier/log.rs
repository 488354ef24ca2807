// crates/error-archive-notify/src/notifier/log.rs
// ============================================================================
// Module: Log Notifier
// Description: Notifier that writes one JSON line per notice.
// Purpose: Provide an append-only notice trail on any writer.
// Dependencies: error-archive-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`LogNotifier`] serializes each notice as a single JSON object followed by
//! a newline. Writes are serialized through a mutex so lines never interleave.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use error_archive_core::ErrorEnvelope;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default notifier name.
const DEFAULT_NAME: &str = "log";

// ============================================================================
// SECTION: Log Record
// ============================================================================

/// One JSON line.
#[derive(Serialize)]
struct LogRecord<'a> {
    /// Notifier name.
    notifier: &'a str,
    /// Stored identifier, null when persistence failed.
    id: Option<String>,
    /// Archived envelope.
    envelope: &'a ErrorEnvelope,
}

// ============================================================================
// SECTION: Log Notifier
// ============================================================================

/// Notifier that appends JSON lines to a writer.
///
/// # Invariants
/// - Each successful delivery writes exactly one newline-terminated line.
pub struct LogNotifier<W: Write + Send> {
    /// Notifier name.
    name: String,
    /// Guarded writer.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogNotifier<W> {
    /// Creates a log notifier named `log`.
    pub fn new(writer: W) -> Self {
        Self::with_name(writer, DEFAULT_NAME)
    }

    /// Creates a log notifier with a custom name.
    pub fn with_name(writer: W, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Notifier for LogNotifier<W> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, notice: &Notice<'_>) -> Result<(), NotifyError> {
        let record = LogRecord {
            notifier: &self.name,
            id: notice.id.map(|id| id.to_string()),
            envelope: notice.envelope,
        };
        let mut line = serde_json::to_vec(&record).map_err(|err| NotifyError::Delivery(err.to_string()))?;
        line.push(b'\n');
        let mut writer =
            self.writer.lock().map_err(|_| NotifyError::Delivery("log writer mutex poisoned".to_string()))?;
        writer.write_all(&line).map_err(|err| NotifyError::Delivery(format!("log write failed: {err}")))?;
        writer.flush().map_err(|err| NotifyError::Delivery(format!("log flush failed: {err}")))
    }
}

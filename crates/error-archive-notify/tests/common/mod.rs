// crates/error-archive-notify/tests/common/mod.rs
// ============================================================================
// Module: Notifier Test Helpers
// Description: Shared fixtures for notifier tests.
// Purpose: Provide sample envelopes and in-memory writers.
// Dependencies: error-archive-core
// ============================================================================

//! Shared fixtures for notifier tests.

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use error_archive_core::EnvelopeDraft;
use error_archive_core::ErrorEnvelope;

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Sample envelope with the given type and message.
pub fn sample_envelope(type_name: &str, message: &str) -> ErrorEnvelope {
    let mut draft = EnvelopeDraft::new(type_name, message);
    draft.application = "shop".to_string();
    draft.host = "web-01".to_string();
    draft.detail = "stack line 1\nstack line 2".to_string();
    draft.finish()
}

// ============================================================================
// SECTION: Shared Buffer for Write Testing
// ============================================================================

/// A thread-safe buffer for testing Write implementations.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    /// Captured bytes.
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Creates a new empty shared buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the contents as a string.
    pub fn to_string_lossy(&self) -> String {
        let guard = self.inner.lock().expect("buffer lock");
        String::from_utf8_lossy(&guard).to_string()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("buffer lock").is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Failing Writer for Error Testing
// ============================================================================

/// A writer that always fails, for testing error paths.
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("simulated write failure"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

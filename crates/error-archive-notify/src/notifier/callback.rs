// crates/error-archive-notify/src/notifier/callback.rs
// ============================================================================
// Module: Callback Notifier
// Description: Notifier that invokes a host-supplied closure.
// Purpose: Let hosts hook notices without writing a Notifier impl.
// Dependencies: error-archive-core
// ============================================================================

//! ## Overview
//! [`CallbackNotifier`] forwards every notice to a synchronous closure. The
//! closure runs on the capturing task, so it should return quickly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use error_archive_core::Notice;
use error_archive_core::Notifier;
use error_archive_core::NotifyError;

// ============================================================================
// SECTION: Callback Notifier
// ============================================================================

/// Closure signature accepted by [`CallbackNotifier`].
type Callback = dyn Fn(&Notice<'_>) -> Result<(), NotifyError> + Send + Sync;

/// Notifier that delegates to a closure.
///
/// # Invariants
/// - Clones share the closure.
#[derive(Clone)]
pub struct CallbackNotifier {
    /// Notifier name.
    name: String,
    /// Delivery closure.
    callback: Arc<Callback>,
}

impl CallbackNotifier {
    /// Creates a callback notifier.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Notice<'_>) -> Result<(), NotifyError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for CallbackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackNotifier").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for CallbackNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, notice: &Notice<'_>) -> Result<(), NotifyError> {
        (self.callback)(notice)
    }
}

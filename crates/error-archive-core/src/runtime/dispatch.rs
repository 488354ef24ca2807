// crates/error-archive-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Error Archive Notification Dispatch
// Description: Fan-out of archived errors to registered notifiers.
// Purpose: Deliver to every non-suppressed notifier with per-notifier isolation.
// Dependencies: crate::interfaces, futures-util, tracing
// ============================================================================

//! ## Overview
//! [`NotificationDispatcher`] invokes notifiers in registration order. A
//! notifier whose name appears in the suppression set is skipped; names
//! compare case-insensitively. A failing or panicking notifier is logged and
//! does not affect the others. Deliveries are not retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::core::envelope::ErrorEnvelope;
use crate::core::identifiers::ErrorId;
use crate::interfaces::Notice;
use crate::interfaces::Notifier;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Per-notifier outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Notifiers that accepted the notice.
    pub delivered: Vec<String>,
    /// Notifiers that failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Notifiers skipped because they were suppressed.
    pub skipped: Vec<String>,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Ordered set of notifiers.
///
/// # Invariants
/// - Notifiers run in registration order, each at most once per dispatch.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    /// Registered notifiers.
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.notifiers.iter().map(|notifier| notifier.name())).finish()
    }
}

impl NotificationDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            notifiers: Vec::new(),
        }
    }

    /// Registers a notifier.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Returns the registered notifier names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.notifiers.iter().map(|notifier| notifier.name().to_string()).collect()
    }

    /// Returns true when no notifiers are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Delivers a notice to every non-suppressed notifier.
    ///
    /// `suppressed` holds lowercase names.
    pub async fn dispatch(
        &self,
        envelope: &ErrorEnvelope,
        id: Option<ErrorId>,
        suppressed: &BTreeSet<String>,
    ) -> DispatchReport {
        let notice = Notice {
            envelope,
            id,
        };
        let mut report = DispatchReport::default();
        for notifier in &self.notifiers {
            let name = notifier.name().to_string();
            if suppressed.contains(&name.to_lowercase()) {
                report.skipped.push(name);
                continue;
            }
            let outcome = AssertUnwindSafe(notifier.notify(&notice)).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => report.delivered.push(name),
                Ok(Err(err)) => {
                    tracing::warn!(notifier = %name, error = %err, "notifier failed");
                    report.failed.push((name, err.to_string()));
                }
                Err(_) => {
                    tracing::error!(notifier = %name, "notifier panicked");
                    report.failed.push((name, "notifier panicked".to_string()));
                }
            }
        }
        report
    }
}

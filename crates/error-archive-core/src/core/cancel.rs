// crates/error-archive-core/src/core/cancel.rs
// ============================================================================
// Module: Error Archive Cancellation
// Description: Cooperative cancellation signal for store and pipeline calls.
// Purpose: Let callers abandon in-flight work between backend round-trips.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`CancelSignal`] is a shared flag checked by backends before each
//! round-trip and by the capture pipeline before persistence. Child signals
//! observe their parent's cancellation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Shared flag state.
#[derive(Debug)]
struct SignalState {
    /// Set once cancellation is requested.
    cancelled: AtomicBool,
    /// Parent signal, if linked.
    parent: Option<CancelSignal>,
}

/// Cooperative cancellation signal.
///
/// # Invariants
/// - Once cancelled, a signal stays cancelled.
/// - Clones share state.
#[derive(Clone)]
pub struct CancelSignal {
    /// Shared state; `None` for a signal that never cancels.
    state: Option<Arc<SignalState>>,
}

impl CancelSignal {
    /// Creates an independent signal.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Some(Arc::new(SignalState { cancelled: AtomicBool::new(false), parent: None })) }
    }

    /// Returns a signal that is never cancelled.
    #[must_use]
    pub const fn never() -> Self {
        Self { state: None }
    }

    /// Creates a child signal cancelled whenever this one is.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            state: Some(Arc::new(SignalState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        if let Some(state) = &self.state {
            state.cancelled.store(true, Ordering::Release);
        }
    }

    /// Returns true when this signal or an ancestor was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let mut current = self;
        while let Some(state) = &current.state {
            if state.cancelled.load(Ordering::Acquire) {
                return true;
            }
            match &state.parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal").field("cancelled", &self.is_cancelled()).finish()
    }
}

// crates/error-archive-core/src/filter/decision.rs
// ============================================================================
// Module: Error Archive Capture Decisions
// Description: Per-capture mutable decision shared by the filter chain.
// Purpose: Let filters dismiss errors or suppress individual notifiers.
// Dependencies: crate::filter::assertion, thiserror
// ============================================================================

//! ## Overview
//! Each capture creates one [`FilterDecision`] and hands it by `&mut` to
//! every registered [`CaptureFilter`] in registration order. Filters may
//! dismiss the error, suppress notifiers by name, or retain the error with
//! suppression in effect.
//! Invariants:
//! - The error is discarded iff it was dismissed and never retained.
//! - Suppression names compare case-insensitively.
//! - A filter that fails leaves the decision as it found it from its own
//!   point of view: its failure is logged and treated as "did not match".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::filter::assertion::Assertion;
use crate::filter::assertion::FilterContext;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Capture filter failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter could not evaluate the error.
    #[error("filter evaluation failed: {0}")]
    Evaluation(String),
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of the filter chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Drop the error without persisting or notifying.
    pub discard: bool,
    /// Lowercased notifier names that must not run.
    pub suppressed: BTreeSet<String>,
}

/// Mutable decision for one captured error.
///
/// # Invariants
/// - Owned by a single capture; never shared across tasks.
#[derive(Debug)]
pub struct FilterDecision<'a> {
    /// Error under test.
    context: FilterContext<'a>,
    /// Dismissal requested.
    dismissed: bool,
    /// Keep-with-suppression requested.
    retained: bool,
    /// Suppressed notifier names (lowercase).
    suppressed: BTreeSet<String>,
}

impl<'a> FilterDecision<'a> {
    /// Creates an undecided decision.
    #[must_use]
    pub const fn new(context: FilterContext<'a>) -> Self {
        Self {
            context,
            dismissed: false,
            retained: false,
            suppressed: BTreeSet::new(),
        }
    }

    /// Returns the error under test.
    #[must_use]
    pub const fn context(&self) -> &FilterContext<'a> {
        &self.context
    }

    /// Requests that the error be discarded.
    pub const fn dismiss(&mut self) {
        self.dismissed = true;
    }

    /// Keeps the error even when dismissed, with suppression in effect.
    pub const fn retain(&mut self) {
        self.retained = true;
    }

    /// Suppresses a notifier by name.
    pub fn suppress(&mut self, notifier: &str) {
        self.suppressed.insert(notifier.to_lowercase());
    }

    /// Returns true when dismissal was requested.
    #[must_use]
    pub const fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    /// Returns true when the error was retained.
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        self.retained
    }

    /// Returns true when the notifier is suppressed.
    #[must_use]
    pub fn is_suppressed(&self, notifier: &str) -> bool {
        self.suppressed.contains(&notifier.to_lowercase())
    }

    /// Resolves the final outcome.
    #[must_use]
    pub fn into_outcome(self) -> FilterOutcome {
        FilterOutcome {
            discard: self.dismissed && !self.retained,
            suppressed: self.suppressed,
        }
    }
}

// ============================================================================
// SECTION: Capture Filters
// ============================================================================

/// Filter consulted for every captured error.
pub trait CaptureFilter: Send + Sync {
    /// Returns a label used in diagnostics.
    fn name(&self) -> &str;

    /// Inspects the error and updates the decision.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the filter cannot evaluate the error.
    fn apply(&self, decision: &mut FilterDecision<'_>) -> Result<(), FilterError>;
}

/// Declarative rule: an assertion plus the notifiers it silences.
///
/// # Invariants
/// - With no notifiers, a match dismisses the error.
/// - With notifiers, a match suppresses each of them and retains the error.
#[derive(Debug, Clone)]
pub struct ErrorFilterRule {
    /// Diagnostic label.
    name: String,
    /// Test applied to each error.
    assertion: Assertion,
    /// Notifiers to suppress on match.
    notifiers: Vec<String>,
}

impl ErrorFilterRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(name: impl Into<String>, assertion: Assertion, notifiers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            assertion,
            notifiers,
        }
    }

    /// Returns the assertion.
    #[must_use]
    pub const fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// Returns the notifiers suppressed on match.
    #[must_use]
    pub fn notifiers(&self) -> &[String] {
        &self.notifiers
    }
}

impl CaptureFilter for ErrorFilterRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, decision: &mut FilterDecision<'_>) -> Result<(), FilterError> {
        let matched = self
            .assertion
            .eval(decision.context())
            .map_err(|err| FilterError::Evaluation(err.to_string()))?;
        if !matched {
            return Ok(());
        }
        if self.notifiers.is_empty() {
            decision.dismiss();
        } else {
            for notifier in &self.notifiers {
                decision.suppress(notifier);
            }
            decision.retain();
        }
        Ok(())
    }
}

/// Closure-backed capture filter.
type FilterFn = dyn Fn(&mut FilterDecision<'_>) -> Result<(), FilterError> + Send + Sync;

/// Capture filter wrapping a closure.
#[derive(Clone)]
pub struct FnFilter {
    /// Diagnostic label.
    name: String,
    /// Filter body.
    body: Arc<FilterFn>,
}

impl FnFilter {
    /// Creates a closure-backed filter.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FilterDecision<'_>) -> Result<(), FilterError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }
}

impl std::fmt::Debug for FnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CaptureFilter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, decision: &mut FilterDecision<'_>) -> Result<(), FilterError> {
        (self.body)(decision)
    }
}

/// Runs every filter in order, treating failures as "did not match".
#[must_use]
pub fn run_filters(filters: &[Arc<dyn CaptureFilter>], context: FilterContext<'_>) -> FilterOutcome {
    let mut decision = FilterDecision::new(context);
    for filter in filters {
        if let Err(err) = filter.apply(&mut decision) {
            tracing::warn!(filter = filter.name(), error = %err, "capture filter failed; ignoring");
        }
    }
    decision.into_outcome()
}

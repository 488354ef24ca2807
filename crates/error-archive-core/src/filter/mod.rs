// crates/error-archive-core/src/filter/mod.rs
// ============================================================================
// Module: Error Archive Filter Engine
// Description: Capture-time rules and retrieval-time filter chains.
// Purpose: Decide which errors are kept, who hears about them, and what a
//          reader sees.
// Dependencies: regex, smallvec
// ============================================================================

//! ## Overview
//! Two filtering surfaces share one assertion language:
//! - Capture: [`CaptureFilter`]s mutate a [`FilterDecision`] to dismiss an
//!   error or suppress notifiers.
//! - Retrieval: a [`FilterChain`] of [`LogFilter`]s keeps a stored record when
//!   the chain is empty or any filter matches.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod assertion;
pub mod decision;
pub mod dsl;
pub mod property;
pub mod search;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assertion::Assertion;
pub use assertion::Binding;
pub use assertion::CompareOp;
pub use assertion::EvalError;
pub use assertion::FilterContext;
pub use assertion::Literal;
pub use assertion::Predicate;
pub use decision::CaptureFilter;
pub use decision::ErrorFilterRule;
pub use decision::FilterDecision;
pub use decision::FilterError;
pub use decision::FilterOutcome;
pub use decision::FnFilter;
pub use decision::run_filters;
pub use dsl::DslError;
pub use dsl::parse_assertion;
pub use property::PropertyField;
pub use property::PropertyFilter;
pub use property::PropertyOp;
pub use search::SearchFilter;

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::envelope::ErrorEnvelope;

// ============================================================================
// SECTION: Retrieval Filters
// ============================================================================

/// Retrieval-time filter over stored envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum LogFilter {
    /// Boolean predicate tree.
    Assertion(Assertion),
    /// `field[-op]:value` filter.
    Property(PropertyFilter),
    /// Free-text search.
    Search(SearchFilter),
}

impl LogFilter {
    /// Tests an envelope; assertion failures count as no match.
    #[must_use]
    pub fn matches(&self, envelope: &ErrorEnvelope) -> bool {
        match self {
            Self::Assertion(assertion) => assertion.matches(&FilterContext::for_envelope(envelope)),
            Self::Property(filter) => filter.matches(envelope),
            Self::Search(filter) => filter.matches(envelope),
        }
    }
}

impl From<PropertyFilter> for LogFilter {
    fn from(value: PropertyFilter) -> Self {
        Self::Property(value)
    }
}

impl From<SearchFilter> for LogFilter {
    fn from(value: SearchFilter) -> Self {
        Self::Search(value)
    }
}

impl From<Assertion> for LogFilter {
    fn from(value: Assertion) -> Self {
        Self::Assertion(value)
    }
}

/// Ordered retrieval filters combined with logical OR.
///
/// # Invariants
/// - An empty chain keeps every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    /// Filters in insertion order.
    filters: Vec<LogFilter>,
}

impl FilterChain {
    /// Creates an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Appends a filter.
    #[must_use]
    pub fn with(mut self, filter: impl Into<LogFilter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Appends a filter in place.
    pub fn push(&mut self, filter: impl Into<LogFilter>) {
        self.filters.push(filter.into());
    }

    /// Returns true when the chain has no filters.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the filters.
    #[must_use]
    pub fn filters(&self) -> &[LogFilter] {
        &self.filters
    }

    /// Tests an envelope.
    #[must_use]
    pub fn keeps(&self, envelope: &ErrorEnvelope) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(envelope))
    }
}

impl FromIterator<LogFilter> for FilterChain {
    fn from_iter<I: IntoIterator<Item = LogFilter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

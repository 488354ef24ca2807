// crates/error-archive-core/src/filter/search.rs
// ============================================================================
// Module: Error Archive Free-Text Search
// Description: Case-insensitive containment over message, detail, and type.
// Purpose: Back the free-text box of archive browsers.
// Dependencies: crate::core::envelope
// ============================================================================

//! ## Overview
//! A [`SearchFilter`] keeps envelopes whose message, detail, or type name
//! contains the search text, ignoring case. Blank search text is not a filter.

use crate::core::envelope::ErrorEnvelope;

/// Free-text retrieval filter.
///
/// # Invariants
/// - The stored needle is lowercase and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchFilter {
    /// Lowercased search text.
    needle: String,
}

impl SearchFilter {
    /// Creates a filter; returns `None` for blank text.
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            needle: text.to_lowercase(),
        })
    }

    /// Returns the lowercased search text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.needle
    }

    /// Tests an envelope.
    #[must_use]
    pub fn matches(&self, envelope: &ErrorEnvelope) -> bool {
        [envelope.message(), envelope.detail(), envelope.type_name()]
            .iter()
            .any(|field| field.to_lowercase().contains(&self.needle))
    }
}

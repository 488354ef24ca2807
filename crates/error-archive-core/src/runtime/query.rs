// crates/error-archive-core/src/runtime/query.rs
// ============================================================================
// Module: Error Archive Retrieval Queries
// Description: Lenient query surface for browsing an archive.
// Purpose: Translate loosely typed browse requests into facade calls.
// Dependencies: crate::filter, crate::runtime::log, serde
// ============================================================================

//! ## Overview
//! [`ErrorQuery`] is the shape browse surfaces (CLI, dashboards) send: raw
//! property-filter strings, optional search text and pagination numbers that
//! may be out of range. Unlike [`ErrorLog::get_page`], this surface clamps
//! instead of rejecting: offsets below zero become zero and page sizes land in
//! `0 ..= 100`. Property strings that do not parse are dropped.
//!
//! [`new_errors_since`] answers "what arrived after the newest error I have
//! seen" by walking the archive newest first in small pages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::cancel::CancelSignal;
use crate::core::envelope::ErrorRecord;
use crate::core::identifiers::ErrorId;
use crate::filter::FilterChain;
use crate::filter::PropertyFilter;
use crate::filter::SearchFilter;
use crate::runtime::log::ErrorLog;
use crate::runtime::log::MAX_PAGE_SIZE;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used while scanning for a known identifier.
pub const NEW_ERRORS_SCAN_PAGE: usize = 10;

/// Page size returned when no usable identifier was supplied.
pub const NEW_ERRORS_FALLBACK_PAGE: usize = 50;

// ============================================================================
// SECTION: Query
// ============================================================================

/// Browse request with unvalidated pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorQuery {
    /// Raw property filters such as `type:IoError` or `message-contains:disk`.
    pub property_filters: Vec<String>,
    /// Free-text search across message, detail and type.
    pub search: Option<String>,
    /// Requested offset; negative values clamp to zero.
    pub offset: i64,
    /// Requested page size; clamped to `0 ..= 100`.
    pub page_size: i64,
}

/// Result of a browse request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorsList {
    /// Matches in scope.
    pub total_count: usize,
    /// Records, newest first.
    pub errors: Vec<ErrorRecord>,
}

impl ErrorQuery {
    /// Builds the retrieval filter chain.
    ///
    /// The search filter comes first, then every property filter that parses.
    #[must_use]
    pub fn filter_chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        if let Some(search) = self.search.as_deref().and_then(SearchFilter::new) {
            chain.push(search);
        }
        for raw in &self.property_filters {
            match PropertyFilter::parse(raw) {
                Some(filter) => chain.push(filter),
                None => tracing::debug!(filter = %raw, "ignoring malformed property filter"),
            }
        }
        chain
    }

    /// Returns the offset clamped to zero or more.
    #[must_use]
    pub fn clamped_offset(&self) -> usize {
        usize::try_from(self.offset.max(0)).unwrap_or(usize::MAX)
    }

    /// Returns the page size clamped to `0 ..= MAX_PAGE_SIZE`.
    #[must_use]
    pub fn clamped_page_size(&self) -> usize {
        usize::try_from(self.page_size.max(0)).map_or(MAX_PAGE_SIZE, |size| size.min(MAX_PAGE_SIZE))
    }

    /// Runs the query against a log.
    pub async fn run(&self, log: &ErrorLog, cancel: &CancelSignal) -> ErrorsList {
        let chain = self.filter_chain();
        fetch(log, &chain, self.clamped_offset(), self.clamped_page_size(), cancel).await
    }
}

// ============================================================================
// SECTION: New Errors
// ============================================================================

/// Returns errors newer than `since`, newest first.
///
/// When `since` is absent or does not parse, the first
/// [`NEW_ERRORS_FALLBACK_PAGE`] matches are returned. Otherwise the archive is
/// scanned in pages of [`NEW_ERRORS_SCAN_PAGE`] until `since` is found; the
/// total count is reported only when it was found.
pub async fn new_errors_since(
    log: &ErrorLog,
    filters: &FilterChain,
    since: Option<&str>,
    cancel: &CancelSignal,
) -> ErrorsList {
    let Some(since) = since.and_then(ErrorId::parse) else {
        return fetch(log, filters, 0, NEW_ERRORS_FALLBACK_PAGE, cancel).await;
    };
    let mut newer = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = fetch(log, filters, offset, NEW_ERRORS_SCAN_PAGE, cancel).await;
        if page.errors.is_empty() {
            break;
        }
        for record in page.errors {
            if record.id() == since {
                return ErrorsList {
                    total_count: page.total_count,
                    errors: newer,
                };
            }
            newer.push(record);
        }
        if cancel.is_cancelled() {
            break;
        }
        offset += NEW_ERRORS_SCAN_PAGE;
    }
    ErrorsList {
        total_count: 0,
        errors: newer,
    }
}

/// Fetches one page through the facade with already clamped bounds.
async fn fetch(
    log: &ErrorLog,
    filters: &FilterChain,
    offset: usize,
    page_size: usize,
    cancel: &CancelSignal,
) -> ErrorsList {
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let page_size = i64::try_from(page_size).unwrap_or(0);
    match log.get_page(filters, offset, page_size, cancel).await {
        Ok(page) => ErrorsList {
            total_count: page.total_count,
            errors: page.records,
        },
        Err(err) => {
            tracing::warn!(error = %err, "browse query rejected");
            ErrorsList::default()
        }
    }
}

// crates/error-archive-core/src/interfaces/mod.rs
// ============================================================================
// Module: Error Archive Interfaces
// Description: Backend-agnostic persistence and notification contracts.
// Purpose: Define the seams concrete stores and notifiers plug into.
// Dependencies: async-trait, crate::core, crate::filter
// ============================================================================

//! ## Overview
//! [`ErrorStore`] is implemented by each persistence backend and consumed
//! through the [`crate::runtime::ErrorLog`] facade, which owns the
//! application scope and swallows transport failures. [`Notifier`] is
//! implemented by every external notification channel.
//!
//! Backends check the supplied [`CancelSignal`] before each round-trip and
//! return [`StoreError::Cancelled`] when it is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::cancel::CancelSignal;
use crate::core::envelope::ErrorEnvelope;
use crate::core::envelope::ErrorRecord;
use crate::core::identifiers::ErrorId;
use crate::filter::FilterChain;

// ============================================================================
// SECTION: Error Store
// ============================================================================

/// Error store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend transport or I/O failure.
    #[error("error store transport error: {0}")]
    Transport(String),
    /// Stored data is corrupted or fails to decode.
    #[error("error store corruption: {0}")]
    Corrupt(String),
    /// Request is invalid for this backend.
    #[error("error store invalid request: {0}")]
    Invalid(String),
    /// Caller cancelled the operation.
    #[error("error store operation cancelled")]
    Cancelled,
    /// Backend reported an error.
    #[error("error store error: {0}")]
    Store(String),
}

/// One page of records plus the total number of matches.
///
/// # Invariants
/// - `records.len()` never exceeds the requested page size.
/// - `total_count` counts every match in scope, not just this page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPage {
    /// Matches in scope.
    pub total_count: usize,
    /// Records, newest first.
    pub records: Vec<ErrorRecord>,
}

/// Persistence backend for archived errors.
///
/// # Invariants
/// - Appends are safe under concurrency; acknowledged records are not lost
///   unless evicted by a capacity bound.
/// - Retrieval is scoped to one application name and ordered newest first.
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Returns the store name stamped onto retrieved records.
    fn name(&self) -> &str;

    /// Persists an envelope under its application name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend rejects or fails the write.
    async fn append(&self, envelope: &ErrorEnvelope, cancel: &CancelSignal) -> Result<ErrorId, StoreError>;

    /// Fetches one record by identifier within an application scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    async fn get_one(
        &self,
        application: &str,
        id: ErrorId,
        cancel: &CancelSignal,
    ) -> Result<Option<ErrorRecord>, StoreError>;

    /// Fetches a page of matching records, newest first.
    ///
    /// `page_size` has already been clamped by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    async fn get_page(
        &self,
        application: &str,
        filters: &FilterChain,
        offset: usize,
        page_size: usize,
        cancel: &CancelSignal,
    ) -> Result<ErrorPage, StoreError>;
}

/// Returns [`StoreError::Cancelled`] when the signal is set.
///
/// # Errors
///
/// Returns [`StoreError::Cancelled`] when cancellation was requested.
pub fn check_cancelled(cancel: &CancelSignal) -> Result<(), StoreError> {
    if cancel.is_cancelled() { Err(StoreError::Cancelled) } else { Ok(()) }
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notifier errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
    /// Notifier is misconfigured.
    #[error("notifier misconfigured: {0}")]
    Config(String),
}

/// Payload handed to each notifier.
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    /// Archived envelope.
    pub envelope: &'a ErrorEnvelope,
    /// Stored identifier, absent when persistence failed.
    pub id: Option<ErrorId>,
}

/// External notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the name used for suppression (compared case-insensitively).
    fn name(&self) -> &str;

    /// Delivers a notice.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    async fn notify(&self, notice: &Notice<'_>) -> Result<(), NotifyError>;
}

// crates/error-archive-core/src/runtime/log.rs
// ============================================================================
// Module: Error Archive Log Facade
// Description: Contract boundary in front of every error store.
// Purpose: Enforce pagination rules, scope records, and absorb backend faults.
// Dependencies: crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! [`ErrorLog`] wraps an [`ErrorStore`] with the persistence contract callers
//! rely on:
//! - negative offsets or page sizes are rejected eagerly;
//! - page sizes above [`MAX_PAGE_SIZE`] are clamped down;
//! - every record is scoped to the log's application name;
//! - backend failures surface as absent or empty results plus a diagnostic.
//!
//! A failed backend and an empty one are indistinguishable to callers; the
//! diagnostic stream is the only place the difference shows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::cancel::CancelSignal;
use crate::core::envelope::ErrorEnvelope;
use crate::core::envelope::ErrorRecord;
use crate::core::identifiers::ApplicationScope;
use crate::core::identifiers::ErrorId;
use crate::core::identifiers::ScopeError;
use crate::filter::FilterChain;
use crate::interfaces::ErrorPage;
use crate::interfaces::ErrorStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest page any retrieval returns.
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Contract violations raised eagerly by the facade.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Caller broke the retrieval contract.
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// Application scope misuse.
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

// ============================================================================
// SECTION: Facade
// ============================================================================

/// Contract facade over an error store.
///
/// # Invariants
/// - The application scope is write-once.
/// - Retrieval never returns more than [`MAX_PAGE_SIZE`] records.
#[derive(Clone)]
pub struct ErrorLog {
    /// Backing store.
    store: Arc<dyn ErrorStore>,
    /// Application scope shared by clones.
    scope: Arc<ApplicationScope>,
}

impl std::fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLog")
            .field("store", &self.store.name())
            .field("application", &self.scope.resolve())
            .finish()
    }
}

impl ErrorLog {
    /// Creates a facade with an uninitialized application scope.
    #[must_use]
    pub fn new(store: Arc<dyn ErrorStore>) -> Self {
        Self {
            store,
            scope: Arc::new(ApplicationScope::new()),
        }
    }

    /// Creates a facade scoped to `application`.
    #[must_use]
    pub fn scoped(store: Arc<dyn ErrorStore>, application: &str) -> Self {
        Self {
            store,
            scope: Arc::new(ApplicationScope::named(application)),
        }
    }

    /// Sets the application name once.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Scope`] when a name is already set.
    pub fn set_application(&self, application: &str) -> Result<(), LogError> {
        self.scope.set(application)?;
        Ok(())
    }

    /// Returns the effective application name.
    #[must_use]
    pub fn application(&self) -> String {
        self.scope.resolve()
    }

    /// Returns the backing store name.
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ErrorStore> {
        &self.store
    }

    /// Persists an envelope, stamping the application scope.
    ///
    /// Returns `None` when the backend failed; the failure is logged.
    pub async fn append(&self, envelope: ErrorEnvelope, cancel: &CancelSignal) -> Option<ErrorId> {
        let envelope = envelope.with_application(self.application());
        match self.store.append(&envelope, cancel).await {
            Ok(id) => Some(id),
            Err(err) => {
                self.report("append", &err);
                None
            }
        }
    }

    /// Fetches one record by identifier.
    ///
    /// Returns `None` when absent or when the backend failed.
    pub async fn get_one(&self, id: ErrorId, cancel: &CancelSignal) -> Option<ErrorRecord> {
        match self.store.get_one(&self.application(), id, cancel).await {
            Ok(record) => record,
            Err(err) => {
                self.report("get_one", &err);
                None
            }
        }
    }

    /// Fetches a page of matching records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ContractViolation`] for a negative offset or page size.
    pub async fn get_page(
        &self,
        filters: &FilterChain,
        offset: i64,
        page_size: i64,
        cancel: &CancelSignal,
    ) -> Result<ErrorPage, LogError> {
        let offset = usize::try_from(offset)
            .map_err(|_| LogError::ContractViolation(format!("offset must be >= 0 (got {offset})")))?;
        let page_size = usize::try_from(page_size).map_err(|_| {
            LogError::ContractViolation(format!("page size must be >= 0 (got {page_size})"))
        })?;
        let page_size = page_size.min(MAX_PAGE_SIZE);
        match self.store.get_page(&self.application(), filters, offset, page_size, cancel).await {
            Ok(mut page) => {
                page.records.truncate(page_size);
                Ok(page)
            }
            Err(err) => {
                self.report("get_page", &err);
                Ok(ErrorPage::default())
            }
        }
    }

    /// Records a swallowed backend failure.
    fn report(&self, operation: &str, err: &StoreError) {
        match err {
            StoreError::Cancelled => {
                tracing::debug!(store = self.store.name(), operation, "error store operation cancelled");
            }
            _ => {
                tracing::error!(
                    store = self.store.name(),
                    operation,
                    error = %err,
                    "error store operation failed"
                );
            }
        }
    }
}

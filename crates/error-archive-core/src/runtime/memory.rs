// crates/error-archive-core/src/runtime/memory.rs
// ============================================================================
// Module: Error Archive In-Memory Store
// Description: Process-lifetime error store for development and tests.
// Purpose: Provide a zero-configuration default backend.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryErrorStore`] keeps envelopes in per-application queues, newest
//! first. Envelopes are held with the same encoded size limit as the
//! persistent backends. It has no capacity bound of its own; hosts call
//! [`InMemoryErrorStore::trim_to`] when they want one. Clones share state,
//! and [`InMemoryErrorStore::shared`] returns a process-wide instance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use async_trait::async_trait;

use crate::core::cancel::CancelSignal;
use crate::core::codec::encode_envelope;
use crate::core::envelope::ErrorEnvelope;
use crate::core::envelope::ErrorRecord;
use crate::core::identifiers::ErrorId;
use crate::filter::FilterChain;
use crate::interfaces::ErrorPage;
use crate::interfaces::ErrorStore;
use crate::interfaces::StoreError;
use crate::interfaces::check_cancelled;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store name stamped onto records.
pub const MEMORY_STORE_NAME: &str = "In-Memory Error Log";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Per-application queues, newest first.
type Scopes = BTreeMap<String, VecDeque<ErrorEnvelope>>;

/// In-memory error store.
///
/// # Invariants
/// - Each queue is ordered newest first by append order.
/// - Clones share the same queues.
#[derive(Debug, Default, Clone)]
pub struct InMemoryErrorStore {
    /// Queues keyed by application name.
    scopes: Arc<Mutex<Scopes>>,
}

impl InMemoryErrorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Returns the process-wide store.
    #[must_use]
    pub fn shared() -> Self {
        static SHARED: OnceLock<InMemoryErrorStore> = OnceLock::new();
        SHARED.get_or_init(Self::new).clone()
    }

    /// Keeps only the newest `keep` records of every application.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store lock is poisoned.
    pub fn trim_to(&self, keep: usize) -> Result<(), StoreError> {
        let mut scopes = self.lock()?;
        for queue in scopes.values_mut() {
            queue.truncate(keep);
        }
        Ok(())
    }

    /// Returns the number of records stored for an application.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store lock is poisoned.
    pub fn len(&self, application: &str) -> Result<usize, StoreError> {
        Ok(self.lock()?.get(application).map_or(0, VecDeque::len))
    }

    /// Acquires the queue map.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Scopes>, StoreError> {
        self.scopes
            .lock()
            .map_err(|_| StoreError::Store("in-memory error store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ErrorStore for InMemoryErrorStore {
    fn name(&self) -> &str {
        MEMORY_STORE_NAME
    }

    async fn append(&self, envelope: &ErrorEnvelope, cancel: &CancelSignal) -> Result<ErrorId, StoreError> {
        check_cancelled(cancel)?;
        encode_envelope(envelope).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut scopes = self.lock()?;
        scopes.entry(envelope.application().to_string()).or_default().push_front(envelope.clone());
        Ok(envelope.id())
    }

    async fn get_one(
        &self,
        application: &str,
        id: ErrorId,
        cancel: &CancelSignal,
    ) -> Result<Option<ErrorRecord>, StoreError> {
        check_cancelled(cancel)?;
        let scopes = self.lock()?;
        Ok(scopes
            .get(application)
            .and_then(|queue| queue.iter().find(|envelope| envelope.id() == id))
            .map(|envelope| ErrorRecord::new(MEMORY_STORE_NAME, envelope.clone())))
    }

    async fn get_page(
        &self,
        application: &str,
        filters: &FilterChain,
        offset: usize,
        page_size: usize,
        cancel: &CancelSignal,
    ) -> Result<ErrorPage, StoreError> {
        check_cancelled(cancel)?;
        let scopes = self.lock()?;
        let Some(queue) = scopes.get(application) else {
            return Ok(ErrorPage::default());
        };
        let mut total_count = 0usize;
        let mut records = Vec::new();
        for envelope in queue.iter().filter(|envelope| filters.keeps(envelope)) {
            if total_count >= offset && records.len() < page_size {
                records.push(ErrorRecord::new(MEMORY_STORE_NAME, envelope.clone()));
            }
            total_count += 1;
        }
        Ok(ErrorPage {
            total_count,
            records,
        })
    }
}

// crates/error-archive-store-capped/src/store.rs
// ============================================================================
// Module: Capped List Error Store
// Description: Capacity-bound ErrorStore over a list + blob driver.
// Purpose: Keep the most recent errors per application with eviction.
// Dependencies: error-archive-core, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! Each append writes the encoded envelope as a blob under
//! `{blob_prefix}{application}:{id}` and pushes that key onto the front of the
//! index list `{list_prefix}{application}`. When the index grows past
//! `maximum_size`, the surplus keys are read from the back, their blobs are
//! deleted best-effort, and the index is trimmed regardless of how the deletes
//! went. Reads slice the index and bulk-fetch blobs; missing blobs are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use error_archive_core::CancelSignal;
use error_archive_core::ErrorEnvelope;
use error_archive_core::ErrorId;
use error_archive_core::ErrorPage;
use error_archive_core::ErrorRecord;
use error_archive_core::ErrorStore;
use error_archive_core::FilterChain;
use error_archive_core::StoreError;
use error_archive_core::core::decode_envelope;
use error_archive_core::core::encode_envelope;
use error_archive_core::interfaces::check_cancelled;
use serde::Deserialize;
use thiserror::Error;

use crate::client::ListClientError;
use crate::client::ListKeyValueClient;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store name stamped onto records.
pub const CAPPED_STORE_NAME: &str = "Capped List Error Log";
/// Default index list key prefix.
const DEFAULT_LIST_PREFIX: &str = "error-archive:list:";
/// Default blob key prefix.
const DEFAULT_BLOB_PREFIX: &str = "error-archive:error:";
/// Default number of errors kept per application.
const DEFAULT_MAXIMUM_SIZE: usize = 200;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the capped store.
///
/// # Invariants
/// - `maximum_size` is at least one.
/// - Prefixes are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CappedStoreConfig {
    /// Prefix of the per-application index list key.
    #[serde(default = "default_list_prefix")]
    pub list_prefix: String,
    /// Prefix of per-error blob keys.
    #[serde(default = "default_blob_prefix")]
    pub blob_prefix: String,
    /// Errors kept per application.
    #[serde(default = "default_maximum_size")]
    pub maximum_size: usize,
    /// Blob time-to-live in seconds.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl Default for CappedStoreConfig {
    fn default() -> Self {
        Self {
            list_prefix: default_list_prefix(),
            blob_prefix: default_blob_prefix(),
            maximum_size: DEFAULT_MAXIMUM_SIZE,
            ttl_seconds: None,
        }
    }
}

impl CappedStoreConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CappedStoreError::Invalid`] when a limit or prefix is unusable.
    pub fn validate(&self) -> Result<(), CappedStoreError> {
        if self.maximum_size == 0 {
            return Err(CappedStoreError::Invalid("maximum_size must be at least 1".to_string()));
        }
        if self.list_prefix.is_empty() || self.blob_prefix.is_empty() {
            return Err(CappedStoreError::Invalid("key prefixes must be non-empty".to_string()));
        }
        if self.list_prefix == self.blob_prefix {
            return Err(CappedStoreError::Invalid("list and blob prefixes must differ".to_string()));
        }
        if self.ttl_seconds == Some(0) {
            return Err(CappedStoreError::Invalid("ttl_seconds must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Returns the blob time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_seconds.map(Duration::from_secs)
    }
}

/// Returns the default list prefix.
fn default_list_prefix() -> String {
    DEFAULT_LIST_PREFIX.to_string()
}

/// Returns the default blob prefix.
fn default_blob_prefix() -> String {
    DEFAULT_BLOB_PREFIX.to_string()
}

/// Returns the default maximum size.
const fn default_maximum_size() -> usize {
    DEFAULT_MAXIMUM_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Capped store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CappedStoreError {
    /// Invalid configuration.
    #[error("capped store invalid config: {0}")]
    Invalid(String),
}

impl From<ListClientError> for StoreError {
    fn from(error: ListClientError) -> Self {
        match error {
            ListClientError::Transport(message) => Self::Transport(message),
            ListClientError::WrongType(key) => Self::Store(format!("key holds a non-list value: {key}")),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Capacity-bound error store.
///
/// # Invariants
/// - Index lists hold blob keys, most recent first.
/// - Clones share the driver.
#[derive(Clone)]
pub struct CappedListStore {
    /// Key-value driver.
    client: Arc<dyn ListKeyValueClient>,
    /// Store configuration.
    config: CappedStoreConfig,
}

impl std::fmt::Debug for CappedListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CappedListStore").field("config", &self.config).finish_non_exhaustive()
    }
}

impl CappedListStore {
    /// Creates a store over `client`.
    ///
    /// # Errors
    ///
    /// Returns [`CappedStoreError::Invalid`] when the configuration is invalid.
    pub fn new(client: Arc<dyn ListKeyValueClient>, config: CappedStoreConfig) -> Result<Self, CappedStoreError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &CappedStoreConfig {
        &self.config
    }

    /// Returns the index list key for an application.
    #[must_use]
    pub fn list_key(&self, application: &str) -> String {
        format!("{}{application}", self.config.list_prefix)
    }

    /// Returns the blob key for one error.
    #[must_use]
    pub fn blob_key(&self, application: &str, id: ErrorId) -> String {
        format!("{}{application}:{id}", self.config.blob_prefix)
    }

    /// Evicts index entries past the maximum size.
    async fn evict(&self, list_key: &str, length: usize) {
        let maximum = self.config.maximum_size;
        if length <= maximum {
            return;
        }
        match self.client.range(list_key, maximum, length - maximum).await {
            Ok(surplus) if !surplus.is_empty() => {
                if let Err(err) = self.client.delete(&surplus).await {
                    tracing::warn!(list = list_key, error = %err, "failed to delete evicted error blobs");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(list = list_key, error = %err, "failed to read evicted index entries");
            }
        }
        if let Err(err) = self.client.trim(list_key, maximum).await {
            tracing::warn!(list = list_key, error = %err, "failed to trim error index");
        }
    }

    /// Fetches and decodes blobs, skipping the ones that are gone.
    async fn load(&self, keys: &[String], cancel: &CancelSignal) -> Result<Vec<ErrorEnvelope>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        check_cancelled(cancel)?;
        let blobs = self.client.get_many(keys).await?;
        blobs
            .into_iter()
            .flatten()
            .map(|blob| decode_envelope(&blob).map_err(|err| StoreError::Corrupt(err.to_string())))
            .collect()
    }
}

#[async_trait]
impl ErrorStore for CappedListStore {
    fn name(&self) -> &str {
        CAPPED_STORE_NAME
    }

    async fn append(&self, envelope: &ErrorEnvelope, cancel: &CancelSignal) -> Result<ErrorId, StoreError> {
        let application = envelope.application();
        let id = envelope.id();
        let blob = encode_envelope(envelope).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let blob_key = self.blob_key(application, id);
        let list_key = self.list_key(application);

        check_cancelled(cancel)?;
        self.client.set(&blob_key, blob, self.config.ttl()).await?;
        check_cancelled(cancel)?;
        let length = self.client.push_front(&list_key, blob_key).await?;
        self.evict(&list_key, length).await;
        Ok(id)
    }

    async fn get_one(
        &self,
        application: &str,
        id: ErrorId,
        cancel: &CancelSignal,
    ) -> Result<Option<ErrorRecord>, StoreError> {
        check_cancelled(cancel)?;
        let Some(blob) = self.client.get(&self.blob_key(application, id)).await? else {
            return Ok(None);
        };
        let envelope = decode_envelope(&blob).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        Ok(Some(ErrorRecord::new(CAPPED_STORE_NAME, envelope)))
    }

    async fn get_page(
        &self,
        application: &str,
        filters: &FilterChain,
        offset: usize,
        page_size: usize,
        cancel: &CancelSignal,
    ) -> Result<ErrorPage, StoreError> {
        let list_key = self.list_key(application);
        check_cancelled(cancel)?;
        let length = self.client.len(&list_key).await?;

        if filters.is_empty() {
            if page_size == 0 || offset >= length {
                return Ok(ErrorPage {
                    total_count: length,
                    records: Vec::new(),
                });
            }
            check_cancelled(cancel)?;
            let keys = self.client.range(&list_key, offset, page_size).await?;
            let records = self
                .load(&keys, cancel)
                .await?
                .into_iter()
                .map(|envelope| ErrorRecord::new(CAPPED_STORE_NAME, envelope))
                .collect();
            return Ok(ErrorPage {
                total_count: length,
                records,
            });
        }

        check_cancelled(cancel)?;
        let keys = self.client.range(&list_key, 0, length).await?;
        let mut total_count = 0usize;
        let mut records = Vec::new();
        for envelope in self.load(&keys, cancel).await? {
            if !filters.keeps(&envelope) {
                continue;
            }
            if total_count >= offset && records.len() < page_size {
                records.push(ErrorRecord::new(CAPPED_STORE_NAME, envelope));
            }
            total_count += 1;
        }
        Ok(ErrorPage {
            total_count,
            records,
        })
    }
}

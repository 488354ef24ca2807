// crates/error-archive-config/src/wiring.rs
// ============================================================================
// Module: Runtime Wiring
// Description: Builds stores, log facades, and capture pipelines from config.
// Purpose: Turn a validated configuration into runnable components.
// Dependencies: error-archive-core, error-archive-store-capped,
//               error-archive-store-sqlite
// ============================================================================

//! ## Overview
//! Wiring maps [`StoreConfig`] onto a concrete [`ErrorStore`] and assembles a
//! [`CapturePipelineBuilder`] with the configured options and filter rules.
//! Notifiers are host-specific and are registered on the returned builder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use error_archive_core::CapturePipeline;
use error_archive_core::ErrorLog;
use error_archive_core::ErrorStore;
use error_archive_core::InMemoryErrorStore;
use error_archive_core::runtime::CapturePipelineBuilder;
use error_archive_store_capped::CappedListStore;
use error_archive_store_capped::CappedStoreConfig;
use error_archive_store_capped::InProcessListClient;
use error_archive_store_capped::ListKeyValueClient;
use error_archive_store_sqlite::SqliteErrorStore;
use error_archive_store_sqlite::SqliteStoreConfig;

use crate::config::ConfigError;
use crate::config::ErrorArchiveConfig;
use crate::config::StoreConfig;
use crate::config::StoreType;

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Builds the configured store; the capped backend uses the in-process driver.
///
/// # Errors
///
/// Returns [`ConfigError`] when the backend cannot be opened.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn ErrorStore>, ConfigError> {
    build_store_with_list_client(config, Arc::new(InProcessListClient::new()))
}

/// Builds the configured store; the capped backend uses `client`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the backend cannot be opened.
pub fn build_store_with_list_client(
    config: &StoreConfig,
    client: Arc<dyn ListKeyValueClient>,
) -> Result<Arc<dyn ErrorStore>, ConfigError> {
    match config.store_type {
        StoreType::Memory => Ok(Arc::new(InMemoryErrorStore::shared())),
        StoreType::Sqlite => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
            let store = SqliteErrorStore::new(SqliteStoreConfig {
                path,
                busy_timeout_ms: config.busy_timeout_ms,
                journal_mode: config.journal_mode,
                sync_mode: config.sync_mode,
                create_tables: config.create_tables,
            })
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
            Ok(Arc::new(store))
        }
        StoreType::Capped => {
            let store = CappedListStore::new(
                client,
                CappedStoreConfig {
                    list_prefix: config.list_prefix.clone(),
                    blob_prefix: config.blob_prefix.clone(),
                    maximum_size: config.maximum_size,
                    ttl_seconds: config.ttl_seconds,
                },
            )
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

// ============================================================================
// SECTION: Facades
// ============================================================================

impl ErrorArchiveConfig {
    /// Builds a log facade over the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store cannot be opened.
    pub fn error_log(&self) -> Result<ErrorLog, ConfigError> {
        let store = build_store(&self.store)?;
        Ok(self.scope(store))
    }

    /// Returns a pipeline builder with the store, options, and filter rules
    /// applied; inline rules run before file rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store cannot be opened or an inline
    /// filter rule is invalid.
    pub fn pipeline_builder(&self) -> Result<CapturePipelineBuilder, ConfigError> {
        let log = self.error_log()?;
        let mut builder = CapturePipeline::builder().log(log).options(self.capture.clone());
        for rule in self.filter_rules()? {
            builder = builder.filter(rule);
        }
        Ok(builder)
    }

    /// Wraps a store in a facade scoped by `application_name`.
    fn scope(&self, store: Arc<dyn ErrorStore>) -> ErrorLog {
        match &self.application_name {
            Some(name) => ErrorLog::scoped(store, name),
            None => ErrorLog::new(store),
        }
    }
}

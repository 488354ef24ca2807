// crates/error-archive-store-capped/src/lib.rs
// ============================================================================
// Module: Error Archive Capped Store Library
// Description: Capacity-bound error store over a list + blob driver.
// Purpose: Keep the most recent errors in a key-value service.
// Dependencies: error-archive-core, tokio
// ============================================================================

//! ## Overview
//! Provides [`CappedListStore`], an [`error_archive_core::ErrorStore`] that
//! writes one blob per error and keeps a most-recent-first index list per
//! application. The driver is abstracted behind [`ListKeyValueClient`];
//! [`InProcessListClient`] is the bundled in-process driver.
//! Invariants:
//! - The index list is trimmed back to the maximum size after every append.
//! - Index entries whose blob is gone are skipped on read.
//! - The size bound is approximate under concurrent writers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::InProcessListClient;
pub use client::ListClientError;
pub use client::ListKeyValueClient;
pub use store::CAPPED_STORE_NAME;
pub use store::CappedListStore;
pub use store::CappedStoreConfig;
pub use store::CappedStoreError;

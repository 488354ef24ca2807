// crates/error-archive-store-sqlite/src/lib.rs
// ============================================================================
// Module: Error Archive SQLite Store Library
// Description: Relational error store backed by SQLite.
// Purpose: Persist archived errors durably with native pagination.
// Dependencies: error-archive-core, rusqlite, tokio
// ============================================================================

//! ## Overview
//! Provides [`SqliteErrorStore`], an [`error_archive_core::ErrorStore`] that
//! keeps one row per archived error. The schema is ensured lazily on first use.
//! Invariants:
//! - Concurrent first callers run the schema check at most once.
//! - Records are ordered by `(time DESC, sequence DESC)` within an application.
//! - The store has no capacity bound.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SQLITE_STORE_NAME;
pub use store::SqliteErrorStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;

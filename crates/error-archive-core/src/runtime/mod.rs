// crates/error-archive-core/src/runtime/mod.rs
// ============================================================================
// Module: Error Archive Runtime
// Description: Capture pipeline, log facade, dispatch, and default store.
// Purpose: Execute the capture-filter-persist-notify flow.
// Dependencies: crate::core, crate::filter, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime components drive a captured failure from envelope construction to
//! storage and notification, and serve retrieval requests against the
//! archive.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod dispatch;
pub mod log;
pub mod memory;
pub mod pipeline;
pub mod query;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatch::DispatchReport;
pub use dispatch::NotificationDispatcher;
pub use log::ErrorLog;
pub use log::LogError;
pub use log::MAX_PAGE_SIZE;
pub use memory::InMemoryErrorStore;
pub use memory::MEMORY_STORE_NAME;
pub use pipeline::CapturePipeline;
pub use pipeline::CapturePipelineBuilder;
pub use pipeline::CaptureReport;
pub use pipeline::CaptureState;
pub use pipeline::DEFAULT_EVENT_CAPACITY;
pub use pipeline::LoggedEntry;
pub use pipeline::PipelineError;
pub use query::ErrorQuery;
pub use query::ErrorsList;
pub use query::NEW_ERRORS_FALLBACK_PAGE;
pub use query::NEW_ERRORS_SCAN_PAGE;
pub use query::new_errors_since;

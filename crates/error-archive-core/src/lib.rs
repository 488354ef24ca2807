// crates/error-archive-core/src/lib.rs
// ============================================================================
// Module: Error Archive Core Library
// Description: In-process error capture, filtering, archiving, and notification.
// Purpose: Provide the pipeline and contracts every error store builds on.
// Dependencies: serde, tokio, tracing, uuid
// ============================================================================

//! ## Overview
//! Error Archive Core turns an unhandled failure into an [`ErrorEnvelope`],
//! runs it through capture filters, persists survivors through an
//! [`ErrorStore`] behind the [`ErrorLog`] facade, and fans it out to
//! registered [`Notifier`]s.
//! Invariants:
//! - [`CapturePipeline::capture`] never fails; faults become diagnostics.
//! - Retrieval is scoped to one application name and ordered newest first.
//! - Negative pagination and resetting the application scope are the only
//!   errors surfaced to callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod filter;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::ApplicationScope;
pub use crate::core::CallerInfo;
pub use crate::core::CancelSignal;
pub use crate::core::CaptureOptions;
pub use crate::core::CapturedException;
pub use crate::core::EnvelopeBuilder;
pub use crate::core::EnvelopeDraft;
pub use crate::core::ErrorEnvelope;
pub use crate::core::ErrorId;
pub use crate::core::ErrorRecord;
pub use crate::core::ExceptionKind;
pub use crate::core::NameValues;
pub use crate::core::RequestContext;
pub use crate::core::RequestLog;
pub use crate::core::RequestSource;
pub use filter::Assertion;
pub use filter::CaptureFilter;
pub use filter::ErrorFilterRule;
pub use filter::FilterChain;
pub use filter::FilterDecision;
pub use filter::LogFilter;
pub use filter::PropertyFilter;
pub use filter::SearchFilter;
pub use filter::parse_assertion;
pub use interfaces::ErrorPage;
pub use interfaces::ErrorStore;
pub use interfaces::Notice;
pub use interfaces::Notifier;
pub use interfaces::NotifyError;
pub use interfaces::StoreError;
pub use runtime::CapturePipeline;
pub use runtime::ErrorLog;
pub use runtime::ErrorQuery;
pub use runtime::ErrorsList;
pub use runtime::InMemoryErrorStore;
pub use runtime::LoggedEntry;
pub use runtime::new_errors_since;

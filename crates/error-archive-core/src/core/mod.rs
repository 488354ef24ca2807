// crates/error-archive-core/src/core/mod.rs
// ============================================================================
// Module: Error Archive Core Types
// Description: Envelope model, identifiers, request context, and codec.
// Purpose: Provide stable, serializable types shared by stores and notifiers.
// Dependencies: serde, time, uuid
// ============================================================================

//! ## Overview
//! Core types define the archived error record and everything needed to
//! assemble it from a failing request.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod builder;
pub mod cancel;
pub mod codec;
pub mod envelope;
pub mod exception;
pub mod identifiers;
pub mod request;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::CaptureOptions;
pub use builder::EnvelopeBuilder;
pub use builder::HTTP_TYPE_NAME;
pub use builder::REQUEST_BODY_KEY;
pub use builder::STATUS_CODE_VARIABLE;
pub use cancel::CancelSignal;
pub use codec::CodecError;
pub use codec::MAX_ENVELOPE_BYTES;
pub use codec::decode_envelope;
pub use codec::encode_envelope;
pub use envelope::DEFAULT_STATUS_CODE;
pub use envelope::EnvelopeDraft;
pub use envelope::ErrorEnvelope;
pub use envelope::ErrorRecord;
pub use envelope::LogMessage;
pub use envelope::NameValue;
pub use envelope::NameValues;
pub use envelope::ParamSnapshot;
pub use envelope::SqlTrace;
pub use exception::CallerInfo;
pub use exception::CapturedException;
pub use exception::ExceptionKind;
pub use identifiers::ApplicationScope;
pub use identifiers::ErrorId;
pub use identifiers::FALLBACK_APPLICATION_NAME;
pub use identifiers::IdentifierError;
pub use identifiers::ScopeError;
pub use identifiers::default_application_name;
pub use request::HarvestError;
pub use request::RequestContext;
pub use request::RequestLog;
pub use request::RequestLogSnapshot;
pub use request::RequestSource;
pub use request::SqlTraceId;

// crates/error-archive-core/src/core/codec.rs
// ============================================================================
// Module: Error Archive Envelope Codec
// Description: JSON wire format shared by every persistent backend.
// Purpose: Encode and decode envelopes with a bounded input size.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Backends store envelopes as JSON documents. Absent collections are omitted
//! on encode, and present-but-empty collections decode as absent.
//!
//! Security posture: stored documents are treated as untrusted input and are
//! rejected above [`MAX_ENVELOPE_BYTES`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::envelope::ErrorEnvelope;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of an encoded envelope.
pub const MAX_ENVELOPE_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Envelope codec errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Encoding failed.
    #[error("envelope encode failed: {0}")]
    Encode(String),
    /// Decoding failed.
    #[error("envelope decode failed: {0}")]
    Decode(String),
    /// Encoded document exceeds the size limit.
    #[error("envelope exceeds size limit: {actual} bytes (max {max})")]
    TooLarge {
        /// Maximum allowed size.
        max: usize,
        /// Actual size.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Encodes an envelope as a JSON document.
///
/// # Errors
///
/// Returns [`CodecError`] when serialization fails or the result is too large.
pub fn encode_envelope(envelope: &ErrorEnvelope) -> Result<String, CodecError> {
    let text = serde_json::to_string(envelope).map_err(|err| CodecError::Encode(err.to_string()))?;
    if text.len() > MAX_ENVELOPE_BYTES {
        return Err(CodecError::TooLarge { max: MAX_ENVELOPE_BYTES, actual: text.len() });
    }
    Ok(text)
}

/// Decodes an envelope from a JSON document.
///
/// # Errors
///
/// Returns [`CodecError`] when the document is too large or malformed.
pub fn decode_envelope(text: &str) -> Result<ErrorEnvelope, CodecError> {
    if text.len() > MAX_ENVELOPE_BYTES {
        return Err(CodecError::TooLarge { max: MAX_ENVELOPE_BYTES, actual: text.len() });
    }
    serde_json::from_str(text).map_err(|err| CodecError::Decode(err.to_string()))
}

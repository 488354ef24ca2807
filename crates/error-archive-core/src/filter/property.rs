// crates/error-archive-core/src/filter/property.rs
// ============================================================================
// Module: Error Archive Property Filters
// Description: `field:value` retrieval filters over envelope fields.
// Purpose: Parse and evaluate the compact property-filter grammar.
// Dependencies: crate::core::envelope
// ============================================================================

//! ## Overview
//! Property filters have the form `field:value`, `field-prefix:value`, or
//! `field-contains:value`. Fields are `type`, `source`, `message`, `user`,
//! `host`, `status-code`, and `application`. Strings that do not follow the
//! grammar parse to `None` and callers ignore them.
//! Invariants:
//! - Equality and prefix tests are case-sensitive.
//! - Containment is case-insensitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::core::envelope::ErrorEnvelope;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Envelope field addressed by a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyField {
    /// Error type name.
    Type,
    /// Error source.
    Source,
    /// Error message.
    Message,
    /// User name.
    User,
    /// Host name.
    Host,
    /// HTTP status code.
    StatusCode,
    /// Application name.
    Application,
}

impl PropertyField {
    /// Parses a field name.
    fn parse(name: &str) -> Option<Self> {
        match name {
            "type" => Some(Self::Type),
            "source" => Some(Self::Source),
            "message" => Some(Self::Message),
            "user" => Some(Self::User),
            "host" => Some(Self::Host),
            "status-code" => Some(Self::StatusCode),
            "application" => Some(Self::Application),
            _ => None,
        }
    }

    /// Returns the field name.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Source => "source",
            Self::Message => "message",
            Self::User => "user",
            Self::Host => "host",
            Self::StatusCode => "status-code",
            Self::Application => "application",
        }
    }

    /// Reads the field from an envelope.
    fn read(self, envelope: &ErrorEnvelope) -> String {
        match self {
            Self::Type => envelope.type_name().to_string(),
            Self::Source => envelope.source().to_string(),
            Self::Message => envelope.message().to_string(),
            Self::User => envelope.user().to_string(),
            Self::Host => envelope.host().to_string(),
            Self::StatusCode => envelope.status_code().to_string(),
            Self::Application => envelope.application().to_string(),
        }
    }
}

/// Comparison applied by a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyOp {
    /// Exact equality.
    Equals,
    /// Prefix match.
    Prefix,
    /// Case-insensitive containment.
    Contains,
}

/// Parsed `field[-op]:value` filter.
///
/// # Invariants
/// - Constructed only through [`PropertyFilter::parse`] or [`PropertyFilter::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyFilter {
    /// Field read.
    field: PropertyField,
    /// Comparison.
    op: PropertyOp,
    /// Operand.
    value: String,
}

impl PropertyFilter {
    /// Creates a filter directly.
    #[must_use]
    pub fn new(field: PropertyField, op: PropertyOp, value: impl Into<String>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }

    /// Parses `field:value`, `field-prefix:value`, or `field-contains:value`.
    ///
    /// Returns `None` for anything else, including unknown fields and a
    /// missing `:`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (head, value) = text.split_once(':')?;
        let head = head.trim();
        // Suffixes first: `status-code` itself contains a hyphen.
        let (name, op) = if let Some(name) = head.strip_suffix("-prefix") {
            (name, PropertyOp::Prefix)
        } else if let Some(name) = head.strip_suffix("-contains") {
            (name, PropertyOp::Contains)
        } else {
            (head, PropertyOp::Equals)
        };
        let field = PropertyField::parse(name)?;
        Some(Self::new(field, op, value))
    }

    /// Returns the addressed field.
    #[must_use]
    pub const fn field(&self) -> PropertyField {
        self.field
    }

    /// Returns the comparison.
    #[must_use]
    pub const fn op(&self) -> PropertyOp {
        self.op
    }

    /// Returns the operand.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Tests an envelope.
    #[must_use]
    pub fn matches(&self, envelope: &ErrorEnvelope) -> bool {
        let actual = self.field.read(envelope);
        match self.op {
            PropertyOp::Equals => actual == self.value,
            PropertyOp::Prefix => actual.starts_with(&self.value),
            PropertyOp::Contains => actual.to_lowercase().contains(&self.value.to_lowercase()),
        }
    }
}

impl fmt::Display for PropertyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.op {
            PropertyOp::Equals => "",
            PropertyOp::Prefix => "-prefix",
            PropertyOp::Contains => "-contains",
        };
        write!(f, "{}{suffix}:{}", self.field.as_str(), self.value)
    }
}

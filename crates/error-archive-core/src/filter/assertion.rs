// crates/error-archive-core/src/filter/assertion.rs
// ============================================================================
// Module: Error Archive Assertions
// Description: Boolean predicate trees evaluated against an archived error.
// Purpose: Provide the composable test used by capture rules and retrieval.
// Dependencies: regex, smallvec, thiserror
// ============================================================================

//! ## Overview
//! An [`Assertion`] is a boolean tree whose leaves compare one bound field of
//! an error against a literal. Composition follows the usual identities: an
//! empty `All` holds, an empty `Any` does not, and `AtLeast` exits as soon as
//! the outcome is decided.
//!
//! Evaluation is fallible. A leaf that cannot be evaluated (for example a
//! request accessor that errors, or a non-numeric value compared with a
//! number) yields [`EvalError`]; callers treat that as "did not match".
//! Invariants:
//! - Evaluation never mutates the context.
//! - Regex leaves are compiled once, at construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use smallvec::SmallVec;
use thiserror::Error;

use crate::core::envelope::ErrorEnvelope;
use crate::core::exception::CapturedException;
use crate::core::request::RequestSource;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Assertion evaluation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A request accessor failed while resolving a binding.
    #[error("binding `{binding}` unavailable: {reason}")]
    Unavailable {
        /// Binding that failed.
        binding: String,
        /// Underlying reason.
        reason: String,
    },
    /// The bound value could not be compared with the literal.
    #[error("binding `{binding}` value `{value}` is not comparable with {literal}")]
    TypeMismatch {
        /// Binding being compared.
        binding: String,
        /// Resolved value.
        value: String,
        /// Literal description.
        literal: String,
    },
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Error under test, with the failure and request when available.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    /// Envelope built for the error.
    pub envelope: &'a ErrorEnvelope,
    /// Captured failure, present at capture time only.
    pub exception: Option<&'a CapturedException>,
    /// Request being served, present at capture time only.
    pub request: Option<&'a dyn RequestSource>,
}

impl<'a> FilterContext<'a> {
    /// Creates a context over a stored envelope.
    #[must_use]
    pub const fn for_envelope(envelope: &'a ErrorEnvelope) -> Self {
        Self { envelope, exception: None, request: None }
    }
}

impl fmt::Debug for FilterContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("envelope", &self.envelope.id())
            .field("exception", &self.exception.map(CapturedException::type_name))
            .field("request", &self.request.is_some())
            .finish()
    }
}

// ============================================================================
// SECTION: Bindings
// ============================================================================

/// Field of an error that a comparison reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Error type name.
    Type,
    /// Error message.
    Message,
    /// Error source.
    Source,
    /// Detail text.
    Detail,
    /// HTTP status code.
    StatusCode,
    /// User name.
    User,
    /// Host name.
    Host,
    /// Application name.
    Application,
    /// Request method.
    Method,
    /// Request path.
    Path,
    /// Named request header.
    Header(String),
    /// Named query string value.
    Query(String),
    /// Named form value.
    Form(String),
    /// Named cookie.
    Cookie(String),
    /// Named server variable.
    Server(String),
}

impl Binding {
    /// Parses a dotted binding name such as `status_code` or `header.User-Agent`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if let Some((scope, key)) = name.split_once('.') {
            if key.is_empty() {
                return None;
            }
            let key = key.to_string();
            return match scope {
                "header" => Some(Self::Header(key)),
                "query" => Some(Self::Query(key)),
                "form" => Some(Self::Form(key)),
                "cookie" => Some(Self::Cookie(key)),
                "server" => Some(Self::Server(key)),
                _ => None,
            };
        }
        match name {
            "type" => Some(Self::Type),
            "message" => Some(Self::Message),
            "source" => Some(Self::Source),
            "detail" => Some(Self::Detail),
            "status_code" => Some(Self::StatusCode),
            "user" => Some(Self::User),
            "host" => Some(Self::Host),
            "application" => Some(Self::Application),
            "method" => Some(Self::Method),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    /// Resolves the bound value; `None` when the error has no such value.
    fn resolve(&self, ctx: &FilterContext<'_>) -> Result<Option<String>, EvalError> {
        let envelope = ctx.envelope;
        let value = match self {
            Self::Type => Some(envelope.type_name().to_string()),
            Self::Message => Some(envelope.message().to_string()),
            Self::Source => Some(envelope.source().to_string()),
            Self::Detail => Some(envelope.detail().to_string()),
            Self::StatusCode => Some(envelope.status_code().to_string()),
            Self::User => Some(envelope.user().to_string()),
            Self::Host => Some(envelope.host().to_string()),
            Self::Application => Some(envelope.application().to_string()),
            Self::Method => match ctx.request {
                Some(request) => Some(request.method().map_err(|err| self.unavailable(&err))?),
                None => None,
            },
            Self::Path => match ctx.request {
                Some(request) => Some(request.path().map_err(|err| self.unavailable(&err))?),
                None => None,
            },
            Self::Header(name) => {
                envelope.server_variables().get(&format!("Header_{name}")).map(str::to_string)
            }
            Self::Query(name) => {
                envelope.query_string().and_then(|values| values.get(name)).map(str::to_string)
            }
            Self::Form(name) => {
                envelope.form().and_then(|values| values.get(name)).map(str::to_string)
            }
            Self::Cookie(name) => {
                envelope.cookies().and_then(|values| values.get(name)).map(str::to_string)
            }
            Self::Server(name) => envelope.server_variables().get(name).map(str::to_string),
        };
        Ok(value)
    }

    /// Wraps an accessor failure.
    fn unavailable(&self, err: &impl fmt::Display) -> EvalError {
        EvalError::Unavailable { binding: self.to_string(), reason: err.to_string() }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => f.write_str("type"),
            Self::Message => f.write_str("message"),
            Self::Source => f.write_str("source"),
            Self::Detail => f.write_str("detail"),
            Self::StatusCode => f.write_str("status_code"),
            Self::User => f.write_str("user"),
            Self::Host => f.write_str("host"),
            Self::Application => f.write_str("application"),
            Self::Method => f.write_str("method"),
            Self::Path => f.write_str("path"),
            Self::Header(name) => write!(f, "header.{name}"),
            Self::Query(name) => write!(f, "query.{name}"),
            Self::Form(name) => write!(f, "form.{name}"),
            Self::Cookie(name) => write!(f, "cookie.{name}"),
            Self::Server(name) => write!(f, "server.{name}"),
        }
    }
}

// ============================================================================
// SECTION: Comparisons
// ============================================================================

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// String literal.
    Text(String),
    /// Integer literal.
    Int(i64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "\"{text}\""),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Starts with.
    StartsWith,
    /// Ends with.
    EndsWith,
    /// Contains (case-insensitive).
    Contains,
}

impl CompareOp {
    /// Applies an ordering outcome to relational operators.
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
            Self::StartsWith | Self::EndsWith | Self::Contains => false,
        }
    }
}

/// Leaf test of an [`Assertion`].
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Compares a binding with a literal.
    Compare {
        /// Field read.
        binding: Binding,
        /// Operator.
        op: CompareOp,
        /// Operand.
        literal: Literal,
    },
    /// Matches a binding against a regular expression.
    Matches {
        /// Field read.
        binding: Binding,
        /// Compiled pattern.
        pattern: Regex,
    },
    /// Holds when any failure in the cause chain has the given type name.
    IsType(String),
    /// Constant outcome.
    Constant(bool),
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Compare { binding, op, literal },
                Self::Compare { binding: other_binding, op: other_op, literal: other_literal },
            ) => binding == other_binding && op == other_op && literal == other_literal,
            (
                Self::Matches { binding, pattern },
                Self::Matches { binding: other_binding, pattern: other_pattern },
            ) => binding == other_binding && pattern.as_str() == other_pattern.as_str(),
            (Self::IsType(left), Self::IsType(right)) => left == right,
            (Self::Constant(left), Self::Constant(right)) => left == right,
            _ => false,
        }
    }
}

impl Predicate {
    /// Evaluates the leaf.
    fn eval(&self, ctx: &FilterContext<'_>) -> Result<bool, EvalError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::IsType(name) => Ok(match ctx.exception {
                Some(exception) => exception.chain().any(|item| item.type_name() == name),
                None => ctx.envelope.type_name() == name,
            }),
            Self::Matches { binding, pattern } => {
                Ok(binding.resolve(ctx)?.is_some_and(|value| pattern.is_match(&value)))
            }
            Self::Compare { binding, op, literal } => {
                let Some(value) = binding.resolve(ctx)? else {
                    return Ok(matches!(op, CompareOp::Ne));
                };
                compare(binding, &value, *op, literal)
            }
        }
    }
}

/// Compares a resolved value with a literal.
fn compare(binding: &Binding, value: &str, op: CompareOp, literal: &Literal) -> Result<bool, EvalError> {
    match literal {
        Literal::Int(expected) => {
            let actual: i64 = value.trim().parse().map_err(|_| EvalError::TypeMismatch {
                binding: binding.to_string(),
                value: value.to_string(),
                literal: literal.to_string(),
            })?;
            match op {
                CompareOp::StartsWith | CompareOp::EndsWith | CompareOp::Contains => {
                    compare_text(value, op, &expected.to_string())
                }
                _ => Ok(op.accepts(actual.cmp(expected))),
            }
        }
        Literal::Text(expected) => compare_text(value, op, expected),
    }
}

/// Compares two strings.
fn compare_text(value: &str, op: CompareOp, expected: &str) -> Result<bool, EvalError> {
    Ok(match op {
        CompareOp::StartsWith => value.starts_with(expected),
        CompareOp::EndsWith => value.ends_with(expected),
        CompareOp::Contains => value.to_lowercase().contains(&expected.to_lowercase()),
        _ => op.accepts(value.cmp(expected)),
    })
}

// ============================================================================
// SECTION: Assertion Tree
// ============================================================================

/// Boolean predicate tree.
///
/// # Invariants
/// - Empty `All` holds; empty `Any` does not.
#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    /// Every child holds.
    All(SmallVec<[Box<Self>; 4]>),
    /// Some child holds.
    Any(SmallVec<[Box<Self>; 4]>),
    /// Child does not hold.
    Not(Box<Self>),
    /// At least `min` children hold.
    AtLeast {
        /// Required count.
        min: u8,
        /// Candidates.
        items: SmallVec<[Box<Self>; 8]>,
    },
    /// Leaf test.
    Predicate(Predicate),
}

impl Assertion {
    /// Creates a conjunction.
    #[must_use]
    pub fn all(items: Vec<Self>) -> Self {
        Self::All(items.into_iter().map(Box::new).collect())
    }

    /// Creates a disjunction.
    #[must_use]
    pub fn any(items: Vec<Self>) -> Self {
        Self::Any(items.into_iter().map(Box::new).collect())
    }

    /// Creates a negation.
    #[must_use]
    pub fn negate(item: Self) -> Self {
        Self::Not(Box::new(item))
    }

    /// Creates a threshold group.
    #[must_use]
    pub fn at_least(min: u8, items: Vec<Self>) -> Self {
        Self::AtLeast { min, items: items.into_iter().map(Box::new).collect() }
    }

    /// Creates a leaf.
    #[must_use]
    pub const fn predicate(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }

    /// Evaluates the tree with short-circuiting.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] when a leaf that decides the outcome cannot be evaluated.
    pub fn eval(&self, ctx: &FilterContext<'_>) -> Result<bool, EvalError> {
        match self {
            Self::Predicate(predicate) => predicate.eval(ctx),
            Self::Not(item) => Ok(!item.eval(ctx)?),
            Self::All(items) => {
                for item in items {
                    if !item.eval(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(items) => {
                for item in items {
                    if item.eval(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::AtLeast { min, items } => {
                let required = usize::from(*min);
                let mut satisfied = 0usize;
                let mut remaining = items.len();
                if required == 0 {
                    return Ok(true);
                }
                for item in items {
                    if item.eval(ctx)? {
                        satisfied += 1;
                        if satisfied >= required {
                            return Ok(true);
                        }
                    }
                    remaining = remaining.saturating_sub(1);
                    if satisfied + remaining < required {
                        return Ok(false);
                    }
                }
                Ok(satisfied >= required)
            }
        }
    }

    /// Evaluates the tree, treating evaluation failures as "did not match".
    #[must_use]
    pub fn matches(&self, ctx: &FilterContext<'_>) -> bool {
        match self.eval(ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "assertion evaluation failed; treating as no match");
                false
            }
        }
    }
}

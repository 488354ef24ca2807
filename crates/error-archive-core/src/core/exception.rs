// crates/error-archive-core/src/core/exception.rs
// ============================================================================
// Module: Error Archive Captured Exceptions
// Description: Owned snapshot of a failure and its cause chain.
// Purpose: Give the builder and filters a uniform view over arbitrary errors.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`CapturedException`] snapshots an error at the capture boundary: its type
//! name, message, origin, detail text, an HTTP classification, and an owned
//! cause chain. Callers either build one explicitly or convert any
//! [`std::error::Error`] via [`CapturedException::from_error`].
//!
//! Caller information is recorded with `#[track_caller]` so the capture site
//! shows up in archived detail text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;
use std::panic::Location;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HTTP classification of a captured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionKind {
    /// Ordinary failure.
    #[default]
    Plain,
    /// Failure of an outbound HTTP request; carries the response status when known.
    HttpRequest {
        /// Response status code.
        status: Option<u16>,
    },
    /// Rejected inbound request carrying the status to report.
    BadRequest {
        /// Status code to report.
        status: u16,
    },
}

/// Source location where a failure was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    /// Function or member name, when the capture site provided one.
    pub member: Option<String>,
    /// Source file.
    pub file: String,
    /// Source line.
    pub line: u32,
}

impl CallerInfo {
    /// Records the caller of the current function.
    #[must_use]
    #[track_caller]
    pub fn here() -> Self {
        Self::from_location(Location::caller())
    }

    /// Converts a [`Location`] into caller info.
    #[must_use]
    pub fn from_location(location: &Location<'_>) -> Self {
        Self { member: None, file: location.file().to_string(), line: location.line() }
    }

    /// Attaches a member name.
    #[must_use]
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

impl fmt::Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{member} in {}:{}", self.file, self.line),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Owned snapshot of a failure and its causes.
///
/// # Invariants
/// - The cause chain is finite and owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedException {
    /// Type name of the failure.
    type_name: String,
    /// Human-readable message.
    message: String,
    /// Component that raised the failure.
    source: String,
    /// Detail text such as a backtrace.
    detail: String,
    /// HTTP classification.
    kind: ExceptionKind,
    /// Underlying cause.
    inner: Option<Box<Self>>,
    /// Capture site.
    caller: Option<CallerInfo>,
}

impl CapturedException {
    /// Creates a plain exception.
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            source: String::new(),
            detail: String::new(),
            kind: ExceptionKind::Plain,
            inner: None,
            caller: None,
        }
    }

    /// Snapshots an error and its `source()` chain, recording the caller.
    #[must_use]
    #[track_caller]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: Error + ?Sized,
    {
        let caller = CallerInfo::here();
        let mut exception = Self::snapshot(std::any::type_name::<E>(), error);
        exception.caller = Some(caller);
        exception
    }

    /// Builds the chain for an error whose concrete type is known only at the top.
    fn snapshot<E>(type_name: &str, error: &E) -> Self
    where
        E: Error + ?Sized,
    {
        let mut causes = Vec::new();
        let mut next = error.source();
        while let Some(cause) = next {
            causes.push(Self::new("error", cause.to_string()));
            next = cause.source();
        }
        let mut inner: Option<Box<Self>> = None;
        for mut cause in causes.into_iter().rev() {
            cause.inner = inner.take();
            inner = Some(Box::new(cause));
        }
        let mut top = Self::new(short_type_name(type_name), error.to_string());
        top.inner = inner;
        top
    }

    /// Sets the component that raised the failure.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Sets the HTTP classification.
    #[must_use]
    pub const fn with_kind(mut self, kind: ExceptionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the underlying cause.
    #[must_use]
    pub fn with_inner(mut self, inner: Self) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Sets the capture site.
    #[must_use]
    pub fn with_caller(mut self, caller: CallerInfo) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the source component.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the detail text.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the HTTP classification.
    #[must_use]
    pub const fn kind(&self) -> ExceptionKind {
        self.kind
    }

    /// Returns the direct cause.
    #[must_use]
    pub fn inner(&self) -> Option<&Self> {
        self.inner.as_deref()
    }

    /// Returns the capture site.
    #[must_use]
    pub const fn caller(&self) -> Option<&CallerInfo> {
        self.caller.as_ref()
    }

    /// Returns the innermost cause (the exception itself when it has none).
    #[must_use]
    pub fn base(&self) -> &Self {
        let mut current = self;
        while let Some(inner) = current.inner.as_deref() {
            current = inner;
        }
        current
    }

    /// Iterates the exception followed by each cause.
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |current| current.inner.as_deref())
    }
}

impl fmt::Display for CapturedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Strips module paths and generic arguments from a Rust type name.
fn short_type_name(full: &str) -> String {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics).to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    /// Error wrapping an I/O cause.
    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer failed")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn from_error_walks_source_chain() {
        let error = Outer(std::io::Error::other("disk gone"));
        let captured = CapturedException::from_error(&error);
        assert_eq!(captured.type_name(), "Outer");
        assert_eq!(captured.chain().count(), 2);
        assert_eq!(captured.base().message(), "disk gone");
        assert!(captured.caller().is_some_and(|caller| caller.file.ends_with("exception.rs")));
    }

    #[test]
    fn base_of_leaf_is_itself() {
        let leaf = CapturedException::new("Leaf", "x");
        assert_eq!(leaf.base().type_name(), "Leaf");
    }
}

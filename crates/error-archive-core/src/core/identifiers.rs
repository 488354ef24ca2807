// crates/error-archive-core/src/core/identifiers.rs
// ============================================================================
// Module: Error Archive Identifiers
// Description: Opaque identifiers and the application scope used by every store.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! Every archived error carries an [`ErrorId`] assigned once at construction.
//! Identifiers render in the 32-hex-digit simple form and parse from any
//! accepted UUID textual form.
//!
//! [`ApplicationScope`] partitions all stored records. It is write-once: the
//! first non-empty name wins and later attempts to change it are rejected.
//! Invariants:
//! - An [`ErrorId`] never changes after construction.
//! - An initialized scope is never empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scope name used when neither configuration nor the executable provides one.
pub const FALLBACK_APPLICATION_NAME: &str = "application";

// ============================================================================
// SECTION: Error Identifier
// ============================================================================

/// Random identifier assigned to an archived error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(Uuid);

impl ErrorId {
    /// Generates a new random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an identifier, returning `None` for malformed input.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.simple().fmt(f)
    }
}

impl FromStr for ErrorId {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| IdentifierError::Malformed(value.to_string()))
    }
}

impl From<Uuid> for ErrorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Identifier parsing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Input is not a UUID.
    #[error("malformed error id: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Application Scope
// ============================================================================

/// Errors raised when configuring the application scope.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope already holds a name.
    #[error("the application name cannot be reset once initialized (current: {0})")]
    AlreadyInitialized(String),
}

/// Write-once application name partitioning archived errors.
///
/// # Invariants
/// - Holds either nothing or a non-empty name.
/// - Once set, the name never changes for the lifetime of the scope.
#[derive(Debug, Default)]
pub struct ApplicationScope {
    /// Name set by configuration.
    name: OnceLock<String>,
}

impl ApplicationScope {
    /// Creates an uninitialized scope.
    #[must_use]
    pub const fn new() -> Self {
        Self { name: OnceLock::new() }
    }

    /// Creates a scope initialized with `name` (ignored when empty).
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let scope = Self::new();
        let name = name.into();
        if !name.trim().is_empty() {
            let _ = scope.name.set(name);
        }
        scope
    }

    /// Sets the scope name.
    ///
    /// An empty name on an uninitialized scope leaves it uninitialized.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::AlreadyInitialized`] on any call after a name
    /// has been set, including the same name or an empty one.
    pub fn set(&self, name: &str) -> Result<(), ScopeError> {
        if let Some(current) = self.name.get() {
            return Err(ScopeError::AlreadyInitialized(current.clone()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        self.name.set(name.to_string()).map_err(|_| {
            ScopeError::AlreadyInitialized(self.name.get().cloned().unwrap_or_default())
        })
    }

    /// Returns true when a name has been set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.name.get().is_some()
    }

    /// Returns the configured name or the default derived from the executable.
    #[must_use]
    pub fn resolve(&self) -> String {
        self.name.get().cloned().unwrap_or_else(default_application_name)
    }
}

impl Clone for ApplicationScope {
    fn clone(&self) -> Self {
        self.name.get().map_or_else(Self::new, |name| Self::named(name.clone()))
    }
}

/// Derives the default scope name from the running executable.
#[must_use]
pub fn default_application_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_APPLICATION_NAME.to_string())
}

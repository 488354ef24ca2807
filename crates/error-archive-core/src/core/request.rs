// crates/error-archive-core/src/core/request.rs
// ============================================================================
// Module: Error Archive Request Context
// Description: Request accessors harvested into archived errors.
// Purpose: Decouple envelope construction from any particular HTTP framework.
// Dependencies: serde_json, time, uuid
// ============================================================================

//! ## Overview
//! [`RequestSource`] is the seam between the capture pipeline and a host web
//! framework. Every accessor is fallible so that a half-torn-down request
//! cannot break capture; the envelope builder skips anything that errors.
//! [`RequestContext`] is a plain data implementation for hosts that snapshot
//! requests eagerly, and for tests.
//!
//! [`RequestLog`] collects side-channel diagnostics (log messages, database
//! command traces, parameter snapshots) while a request runs so they can be
//! attached to any error it produces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::Location;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::envelope::LogMessage;
use crate::core::envelope::NameValues;
use crate::core::envelope::ParamSnapshot;
use crate::core::envelope::SqlTrace;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request accessor failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HarvestError {
    /// The requested part of the request is no longer available.
    #[error("request data unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Request Source
// ============================================================================

/// Read-only view of the request that was being served when a failure occurred.
pub trait RequestSource: Send + Sync {
    /// Returns the request method.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn method(&self) -> Result<String, HarvestError>;

    /// Returns the request path.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn path(&self) -> Result<String, HarvestError>;

    /// Returns request headers in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn headers(&self) -> Result<NameValues, HarvestError>;

    /// Returns request cookies.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn cookies(&self) -> Result<NameValues, HarvestError>;

    /// Returns query string values.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn query(&self) -> Result<NameValues, HarvestError>;

    /// Returns form values.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn form(&self) -> Result<NameValues, HarvestError>;

    /// Returns the authenticated user name, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn user_name(&self) -> Result<Option<String>, HarvestError>;

    /// Returns claims of the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn user_claims(&self) -> Result<NameValues, HarvestError>;

    /// Returns session values.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn session(&self) -> Result<NameValues, HarvestError>;

    /// Returns per-request items.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn items(&self) -> Result<NameValues, HarvestError>;

    /// Returns connection details (addresses, ports).
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn connection(&self) -> Result<NameValues, HarvestError>;

    /// Returns server feature values.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the value cannot be read.
    fn features(&self) -> Result<NameValues, HarvestError>;

    /// Returns the content type of the body, if known.
    fn content_type(&self) -> Option<String> {
        None
    }

    /// Returns true when the body uses chunked transfer encoding.
    fn is_chunked(&self) -> bool {
        false
    }

    /// Returns the side-channel collector attached to the request.
    fn request_log(&self) -> Option<Arc<RequestLog>> {
        None
    }
}

/// Eager snapshot of a request.
///
/// # Invariants
/// - Accessors never fail.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: NameValues,
    /// Request cookies.
    pub cookies: NameValues,
    /// Query string values.
    pub query: NameValues,
    /// Form values.
    pub form: NameValues,
    /// Authenticated user name.
    pub user_name: Option<String>,
    /// User claims.
    pub user_claims: NameValues,
    /// Session values.
    pub session: NameValues,
    /// Per-request items.
    pub items: NameValues,
    /// Connection details.
    pub connection: NameValues,
    /// Server feature values.
    pub features: NameValues,
    /// Body content type.
    pub content_type: Option<String>,
    /// Chunked transfer flag.
    pub chunked: bool,
    /// Side-channel collector.
    pub log: Option<Arc<RequestLog>>,
}

impl RequestContext {
    /// Creates a context for a method and path.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into(), ..Self::default() }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.add(name, value);
        self
    }

    /// Adds a query string value.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.add(name, value);
        self
    }

    /// Adds a form value.
    #[must_use]
    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.add(name, value);
        self
    }

    /// Sets the authenticated user.
    #[must_use]
    pub fn with_user(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Attaches a side-channel collector.
    #[must_use]
    pub fn with_log(mut self, log: Arc<RequestLog>) -> Self {
        self.log = Some(log);
        self
    }
}

impl RequestSource for RequestContext {
    fn method(&self) -> Result<String, HarvestError> {
        Ok(self.method.clone())
    }

    fn path(&self) -> Result<String, HarvestError> {
        Ok(self.path.clone())
    }

    fn headers(&self) -> Result<NameValues, HarvestError> {
        Ok(self.headers.clone())
    }

    fn cookies(&self) -> Result<NameValues, HarvestError> {
        Ok(self.cookies.clone())
    }

    fn query(&self) -> Result<NameValues, HarvestError> {
        Ok(self.query.clone())
    }

    fn form(&self) -> Result<NameValues, HarvestError> {
        Ok(self.form.clone())
    }

    fn user_name(&self) -> Result<Option<String>, HarvestError> {
        Ok(self.user_name.clone())
    }

    fn user_claims(&self) -> Result<NameValues, HarvestError> {
        Ok(self.user_claims.clone())
    }

    fn session(&self) -> Result<NameValues, HarvestError> {
        Ok(self.session.clone())
    }

    fn items(&self) -> Result<NameValues, HarvestError> {
        Ok(self.items.clone())
    }

    fn connection(&self) -> Result<NameValues, HarvestError> {
        Ok(self.connection.clone())
    }

    fn features(&self) -> Result<NameValues, HarvestError> {
        Ok(self.features.clone())
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn is_chunked(&self) -> bool {
        self.chunked
    }

    fn request_log(&self) -> Option<Arc<RequestLog>> {
        self.log.clone()
    }
}

// ============================================================================
// SECTION: Side-Channel Collector
// ============================================================================

/// Handle for a database command started with [`RequestLog::begin_sql`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlTraceId(Uuid);

/// In-flight command trace.
#[derive(Debug)]
struct PendingSql {
    /// Handle returned to the caller.
    id: SqlTraceId,
    /// Monotonic start, used for the duration.
    started: Instant,
    /// Recorded trace.
    trace: SqlTrace,
}

/// Mutable collector state.
#[derive(Debug, Default)]
struct RequestLogState {
    /// Log messages in arrival order.
    messages: Vec<LogMessage>,
    /// Command traces in start order.
    sql: Vec<PendingSql>,
    /// Parameter snapshots.
    params: Vec<ParamSnapshot>,
}

/// Point-in-time copy of a [`RequestLog`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestLogSnapshot {
    /// Log messages.
    pub messages: Vec<LogMessage>,
    /// Command traces ordered by start time.
    pub sql_log: Vec<SqlTrace>,
    /// Non-empty parameter snapshots.
    pub params: Vec<ParamSnapshot>,
}

/// Per-request side-channel diagnostics collector.
///
/// # Invariants
/// - Safe to share across tasks serving the same request.
/// - Recording never fails; a poisoned lock is recovered.
#[derive(Debug, Default)]
pub struct RequestLog {
    /// Collected entries.
    state: Mutex<RequestLogState>,
}

impl RequestLog {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a log message.
    pub fn add_message(&self, message: LogMessage) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).messages.push(message);
    }

    /// Starts tracing a database command.
    pub fn begin_sql(&self, database: impl Into<String>, command: impl Into<String>) -> SqlTraceId {
        let id = SqlTraceId(Uuid::new_v4());
        let pending = PendingSql {
            id,
            started: Instant::now(),
            trace: SqlTrace {
                time: OffsetDateTime::now_utc(),
                database: database.into(),
                command: command.into(),
                duration_ms: None,
            },
        };
        self.state.lock().unwrap_or_else(PoisonError::into_inner).sql.push(pending);
        id
    }

    /// Records the duration of a traced command; unknown handles are ignored.
    pub fn finish_sql(&self, id: SqlTraceId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = state.sql.iter_mut().find(|pending| pending.id == id) {
            pending.trace.duration_ms = Some(pending.started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    /// Records named parameter values at the caller's location.
    #[track_caller]
    pub fn log_parameters(
        &self,
        params: &[(&str, serde_json::Value)],
        type_name: &str,
        member_name: &str,
    ) {
        let location = Location::caller();
        let rendered: NameValues =
            params.iter().map(|(name, value)| ((*name).to_string(), value.to_string())).collect();
        let snapshot = ParamSnapshot {
            time: OffsetDateTime::now_utc(),
            params: rendered,
            type_name: type_name.to_string(),
            member_name: member_name.to_string(),
            file: location.file().to_string(),
            line: location.line(),
        };
        self.state.lock().unwrap_or_else(PoisonError::into_inner).params.push(snapshot);
    }

    /// Copies the collected entries.
    #[must_use]
    pub fn snapshot(&self) -> RequestLogSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sql_log: Vec<SqlTrace> =
            state.sql.iter().map(|pending| pending.trace.clone()).collect();
        sql_log.sort_by_key(|trace| trace.time);
        RequestLogSnapshot {
            messages: state.messages.clone(),
            sql_log,
            params: state.params.iter().filter(|entry| !entry.params.is_empty()).cloned().collect(),
        }
    }
}

// crates/error-archive-core/src/core/envelope.rs
// ============================================================================
// Module: Error Archive Envelope
// Description: Canonical archived-error record and its request snapshots.
// Purpose: Provide an immutable, serializable unit of storage for every backend.
// Dependencies: serde, time, uuid
// ============================================================================

//! ## Overview
//! An [`ErrorEnvelope`] is the single unit every store persists and every
//! notifier receives. Envelopes are assembled through an [`EnvelopeDraft`]
//! and frozen by [`EnvelopeDraft::finish`]; afterwards only read accessors
//! remain.
//! Invariants:
//! - `time` is always UTC.
//! - Optional request collections are either absent or non-empty, both in
//!   memory and on the wire.
//! - `server_variables` is always present.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

use crate::core::identifiers::ErrorId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status code recorded when nothing more specific is known.
pub const DEFAULT_STATUS_CODE: u16 = 500;

// ============================================================================
// SECTION: Name/Value Collections
// ============================================================================

/// One entry of a [`NameValues`] collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    /// Entry name.
    pub name: String,
    /// Entry value.
    pub value: String,
}

/// Ordered string multimap preserving insertion order.
///
/// # Invariants
/// - Iteration order equals insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameValues(Vec<NameValue>);

impl NameValues {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an entry, keeping any existing entry of the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(NameValue { name: name.into(), value: value.into() });
    }

    /// Adds an entry, comma-joining the value onto an existing entry of the same name.
    pub fn merge(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.0.iter_mut().find(|entry| entry.name == name) {
            existing.value.push(',');
            existing.value.push_str(&value);
        } else {
            self.0.push(NameValue { name, value });
        }
    }

    /// Returns the first value stored under `name` (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.value.as_str())
    }

    /// Returns an iterator over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NameValue> {
        self.0.iter()
    }

    /// Returns the entry count.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the collection has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts an empty collection into `None`.
    #[must_use]
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for NameValues {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (name, value) in iter {
            values.add(name, value);
        }
        values
    }
}

// ============================================================================
// SECTION: Side-Channel Entries
// ============================================================================

/// Free-form log message captured during the failing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Time the message was recorded.
    #[serde(with = "utc_rfc3339")]
    pub time: OffsetDateTime,
    /// Severity label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Logging scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Rendered message text.
    pub message: String,
    /// Exception text attached to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// Trace of one database command executed during the failing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlTrace {
    /// Time the command started.
    #[serde(with = "utc_rfc3339")]
    pub time: OffsetDateTime,
    /// Database kind label.
    pub database: String,
    /// Command text.
    pub command: String,
    /// Elapsed time when the command finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// Snapshot of named parameters recorded at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    /// Time the snapshot was taken.
    #[serde(with = "utc_rfc3339")]
    pub time: OffsetDateTime,
    /// Parameter names and rendered values.
    pub params: NameValues,
    /// Owning type name.
    pub type_name: String,
    /// Member (function) name.
    pub member_name: String,
    /// Source file.
    pub file: String,
    /// Source line.
    pub line: u32,
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Immutable archived-error record.
///
/// # Invariants
/// - Construct through [`EnvelopeDraft::finish`] or deserialization only.
/// - `query_string`, `cookies`, `form`, `messages`, `sql_log` and `params`
///   are `None` rather than empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Record identifier.
    id: ErrorId,
    /// Creation time (UTC).
    #[serde(with = "utc_rfc3339")]
    time: OffsetDateTime,
    /// Application scope name.
    #[serde(default)]
    application: String,
    /// Error type name.
    #[serde(rename = "type", default)]
    type_name: String,
    /// Error message.
    #[serde(default)]
    message: String,
    /// Error source (component or assembly).
    #[serde(default)]
    source: String,
    /// Detail text (stack trace).
    #[serde(default)]
    detail: String,
    /// HTTP status code.
    #[serde(default = "default_status_code")]
    status_code: u16,
    /// Host name.
    #[serde(default)]
    host: String,
    /// Authenticated user name.
    #[serde(default)]
    user: String,
    /// Harvested server variables.
    #[serde(default)]
    server_variables: NameValues,
    /// Query string values.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_values"
    )]
    query_string: Option<NameValues>,
    /// Request cookies.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_values"
    )]
    cookies: Option<NameValues>,
    /// Form values.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_values"
    )]
    form: Option<NameValues>,
    /// Log messages recorded during the request.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty_list")]
    messages: Option<Vec<LogMessage>>,
    /// Database command traces.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty_list")]
    sql_log: Option<Vec<SqlTrace>>,
    /// Parameter snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty_list")]
    params: Option<Vec<ParamSnapshot>>,
}

impl ErrorEnvelope {
    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> ErrorId {
        self.id
    }

    /// Returns the creation time (UTC).
    #[must_use]
    pub const fn time(&self) -> OffsetDateTime {
        self.time
    }

    /// Returns the application scope name.
    #[must_use]
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Returns the error type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the detail text.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Returns the host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the harvested server variables.
    #[must_use]
    pub const fn server_variables(&self) -> &NameValues {
        &self.server_variables
    }

    /// Returns the query string values when present.
    #[must_use]
    pub const fn query_string(&self) -> Option<&NameValues> {
        self.query_string.as_ref()
    }

    /// Returns the cookies when present.
    #[must_use]
    pub const fn cookies(&self) -> Option<&NameValues> {
        self.cookies.as_ref()
    }

    /// Returns the form values when present.
    #[must_use]
    pub const fn form(&self) -> Option<&NameValues> {
        self.form.as_ref()
    }

    /// Returns the recorded log messages when present.
    #[must_use]
    pub fn messages(&self) -> Option<&[LogMessage]> {
        self.messages.as_deref()
    }

    /// Returns the recorded database traces when present.
    #[must_use]
    pub fn sql_log(&self) -> Option<&[SqlTrace]> {
        self.sql_log.as_deref()
    }

    /// Returns the recorded parameter snapshots when present.
    #[must_use]
    pub fn params(&self) -> Option<&[ParamSnapshot]> {
        self.params.as_deref()
    }

    /// Returns a copy scoped to `application`.
    #[must_use]
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    /// Reopens the envelope as a draft, keeping its identifier and time.
    #[must_use]
    pub fn into_draft(self) -> EnvelopeDraft {
        EnvelopeDraft {
            id: Some(self.id),
            time: Some(self.time),
            application: self.application,
            type_name: self.type_name,
            message: self.message,
            source: self.source,
            detail: self.detail,
            status_code: self.status_code,
            host: self.host,
            user: self.user,
            server_variables: self.server_variables,
            query_string: self.query_string.unwrap_or_default(),
            cookies: self.cookies.unwrap_or_default(),
            form: self.form.unwrap_or_default(),
            messages: self.messages.unwrap_or_default(),
            sql_log: self.sql_log.unwrap_or_default(),
            params: self.params.unwrap_or_default(),
        }
    }
}

// ============================================================================
// SECTION: Draft
// ============================================================================

/// Mutable staging area for an [`ErrorEnvelope`].
///
/// # Invariants
/// - `finish` assigns a fresh identifier and the current UTC time when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeDraft {
    /// Identifier to keep; generated when `None`.
    pub id: Option<ErrorId>,
    /// Creation time to keep; current time when `None`.
    pub time: Option<OffsetDateTime>,
    /// Application scope name.
    pub application: String,
    /// Error type name.
    pub type_name: String,
    /// Error message.
    pub message: String,
    /// Error source.
    pub source: String,
    /// Detail text.
    pub detail: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Host name.
    pub host: String,
    /// User name.
    pub user: String,
    /// Server variables.
    pub server_variables: NameValues,
    /// Query string values.
    pub query_string: NameValues,
    /// Cookies.
    pub cookies: NameValues,
    /// Form values.
    pub form: NameValues,
    /// Log messages.
    pub messages: Vec<LogMessage>,
    /// Database traces.
    pub sql_log: Vec<SqlTrace>,
    /// Parameter snapshots.
    pub params: Vec<ParamSnapshot>,
}

impl Default for EnvelopeDraft {
    fn default() -> Self {
        Self {
            id: None,
            time: None,
            application: String::new(),
            type_name: String::new(),
            message: String::new(),
            source: String::new(),
            detail: String::new(),
            status_code: DEFAULT_STATUS_CODE,
            host: String::new(),
            user: String::new(),
            server_variables: NameValues::new(),
            query_string: NameValues::new(),
            cookies: NameValues::new(),
            form: NameValues::new(),
            messages: Vec::new(),
            sql_log: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl EnvelopeDraft {
    /// Creates a draft with a type name and message.
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), message: message.into(), ..Self::default() }
    }

    /// Freezes the draft into an immutable envelope.
    #[must_use]
    pub fn finish(self) -> ErrorEnvelope {
        let time = self.time.unwrap_or_else(OffsetDateTime::now_utc).to_offset(UtcOffset::UTC);
        ErrorEnvelope {
            id: self.id.unwrap_or_else(ErrorId::generate),
            time,
            application: self.application,
            type_name: self.type_name,
            message: self.message,
            source: self.source,
            detail: self.detail,
            status_code: self.status_code,
            host: self.host,
            user: self.user,
            server_variables: self.server_variables,
            query_string: self.query_string.non_empty(),
            cookies: self.cookies.non_empty(),
            form: self.form.non_empty(),
            messages: non_empty_vec(self.messages),
            sql_log: non_empty_vec(self.sql_log),
            params: non_empty_vec(self.params),
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Envelope returned from a store, tagged with the store that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Name of the originating store.
    store: String,
    /// Archived envelope.
    envelope: ErrorEnvelope,
}

impl ErrorRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(store: impl Into<String>, envelope: ErrorEnvelope) -> Self {
        Self { store: store.into(), envelope }
    }

    /// Returns the originating store name.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Returns the envelope identifier.
    #[must_use]
    pub const fn id(&self) -> ErrorId {
        self.envelope.id
    }

    /// Returns the archived envelope.
    #[must_use]
    pub const fn envelope(&self) -> &ErrorEnvelope {
        &self.envelope
    }

    /// Consumes the record, returning the envelope.
    #[must_use]
    pub fn into_envelope(self) -> ErrorEnvelope {
        self.envelope
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default status for deserialization.
const fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

/// Converts an empty vector into `None`.
fn non_empty_vec<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

/// Decodes an optional collection, treating present-but-empty as absent.
fn non_empty_values<'de, D>(deserializer: D) -> Result<Option<NameValues>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<NameValues>::deserialize(deserializer)?;
    Ok(values.and_then(NameValues::non_empty))
}

/// Decodes an optional list, treating present-but-empty as absent.
fn non_empty_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(items.and_then(non_empty_vec))
}

/// RFC 3339 timestamps normalized to UTC on both encode and decode.
mod utc_rfc3339 {
    use super::Deserialize;
    use super::Deserializer;
    use super::OffsetDateTime;
    use super::Rfc3339;
    use super::Serializer;
    use super::UtcOffset;

    /// Serializes a timestamp as RFC 3339 in UTC.
    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = value
            .to_offset(UtcOffset::UTC)
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    /// Deserializes an RFC 3339 timestamp and converts it to UTC.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339)
            .map(|value| value.to_offset(UtcOffset::UTC))
            .map_err(serde::de::Error::custom)
    }
}

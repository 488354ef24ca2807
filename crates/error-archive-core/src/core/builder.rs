// crates/error-archive-core/src/core/builder.rs
// ============================================================================
// Module: Error Archive Envelope Builder
// Description: Assembles an ErrorEnvelope from a failure and its request.
// Purpose: Harvest request context best-effort without ever failing capture.
// Dependencies: crate::core, serde, tracing
// ============================================================================

//! ## Overview
//! [`EnvelopeBuilder`] turns a [`CapturedException`] plus an optional
//! [`RequestSource`] into an [`ErrorEnvelope`]. Each request accessor is
//! consulted independently; an accessor that errors is skipped with a debug
//! record and the rest of the envelope is still produced.
//! Invariants:
//! - `build` never fails.
//! - `server_variables` always ends with `HttpStatusCode`.
//! - Cookie headers are never copied into server variables.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::envelope::DEFAULT_STATUS_CODE;
use crate::core::envelope::EnvelopeDraft;
use crate::core::envelope::ErrorEnvelope;
use crate::core::envelope::NameValues;
use crate::core::exception::CapturedException;
use crate::core::exception::ExceptionKind;
use crate::core::request::HarvestError;
use crate::core::request::RequestSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Form key holding the raw request body.
pub const REQUEST_BODY_KEY: &str = "$request-body";

/// Server variable always appended with the final status code.
pub const STATUS_CODE_VARIABLE: &str = "HttpStatusCode";

/// Type name recorded for HTTP failures without an underlying cause.
pub const HTTP_TYPE_NAME: &str = "HTTP";

/// Content types whose bodies are recorded as text.
const TEXTUAL_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/x-www-form-urlencoded",
    "application/javascript",
    "application/soap+xml",
    "application/xhtml+xml",
    "application/xml",
    "text/html",
    "text/javascript",
    "text/plain",
    "text/xml",
    "text/markdown",
];

// ============================================================================
// SECTION: Options
// ============================================================================

/// Controls which parts of the request are recorded.
///
/// # Invariants
/// - Defaults record form values and cookies but not the raw body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureOptions {
    /// Record form values.
    #[serde(default = "default_true")]
    pub log_request_form: bool,
    /// Record the raw request body under [`REQUEST_BODY_KEY`].
    #[serde(default)]
    pub log_request_body: bool,
    /// Record cookies.
    #[serde(default = "default_true")]
    pub log_request_cookies: bool,
    /// Host name override; the machine name is used when absent.
    #[serde(default)]
    pub host_name: Option<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            log_request_form: true,
            log_request_body: false,
            log_request_cookies: true,
            host_name: None,
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds envelopes according to [`CaptureOptions`].
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    /// Recording options.
    options: CaptureOptions,
    /// Resolved host name.
    host: String,
}

impl EnvelopeBuilder {
    /// Creates a builder, resolving the host name once.
    #[must_use]
    pub fn new(options: CaptureOptions) -> Self {
        let host = options.host_name.clone().unwrap_or_else(machine_name);
        Self { options, host }
    }

    /// Returns the recording options.
    #[must_use]
    pub const fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Builds an envelope; harvest failures are skipped.
    #[must_use]
    pub fn build(
        &self,
        exception: Option<&CapturedException>,
        request: Option<&dyn RequestSource>,
        body: Option<&str>,
    ) -> ErrorEnvelope {
        let mut draft = EnvelopeDraft { host: self.host.clone(), ..EnvelopeDraft::default() };
        if let Some(exception) = exception {
            apply_exception(&mut draft, exception);
        }
        if let Some(request) = request {
            self.apply_request(&mut draft, request, body);
        }
        draft.server_variables.add(STATUS_CODE_VARIABLE, draft.status_code.to_string());
        draft.finish()
    }

    /// Copies request collections into the draft.
    fn apply_request(&self, draft: &mut EnvelopeDraft, request: &dyn RequestSource, body: Option<&str>) {
        draft.server_variables = server_variables(request);
        draft.query_string = harvest("query", request.query());
        if self.options.log_request_cookies {
            draft.cookies = harvest("cookies", request.cookies());
        }
        if self.options.log_request_form {
            draft.form = harvest("form", request.form());
        }
        if self.options.log_request_body
            && let Some(body) = body.filter(|body| !body.is_empty())
            && is_textual_body(request)
        {
            draft.form.add(REQUEST_BODY_KEY, body);
        }
        match request.user_name() {
            Ok(Some(user)) if !user.is_empty() => draft.user = user,
            Ok(_) => {}
            Err(err) => tracing::debug!(accessor = "user_name", error = %err, "skipping request accessor"),
        }
        if let Some(log) = request.request_log() {
            let snapshot = log.snapshot();
            draft.messages = snapshot.messages;
            draft.sql_log = snapshot.sql_log;
            draft.params = snapshot.params;
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serde default helper.
const fn default_true() -> bool {
    true
}

/// Copies failure details into the draft.
fn apply_exception(draft: &mut EnvelopeDraft, exception: &CapturedException) {
    let mut status = status_from_outer(exception);
    let base = exception.base();
    draft.type_name = base.type_name().to_string();
    draft.message = base.message().to_string();
    draft.source = base.source().to_string();
    if let ExceptionKind::HttpRequest { status: Some(code) } = base.kind() {
        status = code;
        // The base has no inner cause, so the HTTP failure stands alone.
        draft.type_name = HTTP_TYPE_NAME.to_string();
    }
    draft.status_code = status;
    draft.detail = render_detail(exception);
}

/// Status code carried by the outermost failure, or the default.
const fn status_from_outer(exception: &CapturedException) -> u16 {
    match exception.kind() {
        ExceptionKind::BadRequest { status } | ExceptionKind::HttpRequest { status: Some(status) } => {
            status
        }
        ExceptionKind::HttpRequest { status: None } | ExceptionKind::Plain => DEFAULT_STATUS_CODE,
    }
}

/// Renders the full chain with the capture site prepended.
fn render_detail(exception: &CapturedException) -> String {
    let mut detail = exception
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n ---> ");
    if !exception.detail().is_empty() {
        detail.push('\n');
        detail.push_str(exception.detail());
    }
    if let Some(caller) = exception.caller() {
        detail = format!("# caller: {caller}\n{detail}");
    }
    detail
}

/// Returns a harvested collection or an empty one when the accessor failed.
fn harvest(accessor: &str, result: Result<NameValues, HarvestError>) -> NameValues {
    result.unwrap_or_else(|err| {
        tracing::debug!(accessor, error = %err, "skipping request accessor");
        NameValues::new()
    })
}

/// Harvests prefixed server variables in a fixed order.
fn server_variables(request: &dyn RequestSource) -> NameValues {
    let mut variables = NameValues::new();
    let mut load = |accessor: &str, result: Result<NameValues, HarvestError>, prefix: &str| {
        for entry in harvest(accessor, result).iter() {
            variables.merge(format!("{prefix}{}", entry.name), entry.value.clone());
        }
    };
    load("features", request.features(), "");
    let headers = harvest("headers", request.headers());
    let headers: NameValues = headers
        .iter()
        .filter(|entry| !entry.name.eq_ignore_ascii_case("cookie"))
        .map(|entry| (entry.name.clone(), entry.value.clone()))
        .collect();
    load("headers", Ok(headers), "Header_");
    load("user_claims", request.user_claims(), "User_");
    load("session", request.session(), "Session_");
    load("items", request.items(), "Items_");
    load("connection", request.connection(), "Connection_");
    variables
}

/// Returns true when the request body may be recorded as text.
fn is_textual_body(request: &dyn RequestSource) -> bool {
    if request.is_chunked() {
        return false;
    }
    request.content_type().is_some_and(|content_type| {
        let content_type = content_type.to_ascii_lowercase();
        TEXTUAL_CONTENT_TYPES.iter().any(|supported| content_type.contains(supported))
    })
}

/// Resolves the machine name from the environment.
fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .unwrap_or_default()
}

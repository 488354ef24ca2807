// crates/error-archive-core/tests/envelope.rs
// ============================================================================
// Module: Envelope Tests
// Description: Envelope construction, harvesting, and JSON codec behavior.
// Purpose: Ensure envelopes carry the documented fields and normalize empties.
// Dependencies: error-archive-core, serde_json
// ============================================================================

//! Envelope builder and codec tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use error_archive_core::CallerInfo;
use error_archive_core::CaptureOptions;
use error_archive_core::CapturedException;
use error_archive_core::EnvelopeBuilder;
use error_archive_core::EnvelopeDraft;
use error_archive_core::ExceptionKind;
use error_archive_core::NameValues;
use error_archive_core::RequestContext;
use error_archive_core::RequestLog;
use error_archive_core::core::HarvestError;
use error_archive_core::core::LogMessage;
use error_archive_core::core::REQUEST_BODY_KEY;
use error_archive_core::core::RequestSource;
use error_archive_core::core::STATUS_CODE_VARIABLE;
use error_archive_core::core::decode_envelope;
use error_archive_core::core::encode_envelope;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builder with a fixed host so tests do not depend on the machine.
fn builder(options: CaptureOptions) -> EnvelopeBuilder {
    EnvelopeBuilder::new(CaptureOptions {
        host_name: Some("test-host".to_string()),
        ..options
    })
}

/// Request whose user accessor always fails.
struct BrokenUserRequest(RequestContext);

impl RequestSource for BrokenUserRequest {
    fn method(&self) -> Result<String, HarvestError> {
        self.0.method()
    }

    fn path(&self) -> Result<String, HarvestError> {
        self.0.path()
    }

    fn headers(&self) -> Result<NameValues, HarvestError> {
        Err(HarvestError::Unavailable("headers already sent".to_string()))
    }

    fn cookies(&self) -> Result<NameValues, HarvestError> {
        self.0.cookies()
    }

    fn query(&self) -> Result<NameValues, HarvestError> {
        self.0.query()
    }

    fn form(&self) -> Result<NameValues, HarvestError> {
        Err(HarvestError::Unavailable("form not buffered".to_string()))
    }

    fn user_name(&self) -> Result<Option<String>, HarvestError> {
        Err(HarvestError::Unavailable("no identity".to_string()))
    }

    fn user_claims(&self) -> Result<NameValues, HarvestError> {
        self.0.user_claims()
    }

    fn session(&self) -> Result<NameValues, HarvestError> {
        Err(HarvestError::Unavailable("session disabled".to_string()))
    }

    fn items(&self) -> Result<NameValues, HarvestError> {
        self.0.items()
    }

    fn connection(&self) -> Result<NameValues, HarvestError> {
        self.0.connection()
    }

    fn features(&self) -> Result<NameValues, HarvestError> {
        self.0.features()
    }
}

/// Log sink shared between a test and its subscriber.
#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl SharedLog {
    /// Returns everything written so far.
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Error with a single source.
#[derive(Debug)]
struct WrappedError {
    /// Underlying failure.
    inner: std::io::Error,
}

impl std::fmt::Display for WrappedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("failed to load settings")
    }
}

impl std::error::Error for WrappedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

#[test]
fn builder_defaults_to_500_and_records_status_variable() {
    let exception = CapturedException::new("IoError", "disk full").with_source("storage");
    let envelope = builder(CaptureOptions::default()).build(Some(&exception), None, None);

    assert_eq!(envelope.status_code(), 500);
    assert_eq!(envelope.type_name(), "IoError");
    assert_eq!(envelope.message(), "disk full");
    assert_eq!(envelope.source(), "storage");
    assert_eq!(envelope.host(), "test-host");
    assert_eq!(envelope.server_variables().get(STATUS_CODE_VARIABLE), Some("500"));
    assert!(envelope.query_string().is_none());
    assert!(envelope.cookies().is_none());
    assert!(envelope.form().is_none());
    assert!(envelope.messages().is_none());
}

#[test]
fn builder_uses_innermost_cause_and_outer_status() {
    let exception = CapturedException::new("HandlerError", "request failed")
        .with_kind(ExceptionKind::BadRequest {
            status: 400,
        })
        .with_inner(CapturedException::new("ParseIntError", "invalid digit"));
    let envelope = builder(CaptureOptions::default()).build(Some(&exception), None, None);

    assert_eq!(envelope.type_name(), "ParseIntError");
    assert_eq!(envelope.message(), "invalid digit");
    assert_eq!(envelope.status_code(), 400);
    assert!(envelope.detail().contains("HandlerError: request failed\n ---> ParseIntError: invalid digit"));
}

#[test]
fn builder_promotes_http_base_cause() {
    let exception = CapturedException::new("Wrapper", "outer")
        .with_inner(
            CapturedException::new("HttpRequestError", "not found")
                .with_source("upstream")
                .with_kind(ExceptionKind::HttpRequest {
                    status: Some(404),
                }),
        );
    let envelope = builder(CaptureOptions::default()).build(Some(&exception), None, None);

    assert_eq!(envelope.type_name(), "HTTP");
    assert_eq!(envelope.message(), "not found");
    assert_eq!(envelope.source(), "upstream");
    assert_eq!(envelope.status_code(), 404);
    assert_eq!(envelope.server_variables().get(STATUS_CODE_VARIABLE), Some("404"));
}

#[test]
fn builder_keeps_type_for_http_failure_without_status() {
    let exception = CapturedException::new("HttpRequestError", "connection reset").with_kind(
        ExceptionKind::HttpRequest {
            status: None,
        },
    );
    let envelope = builder(CaptureOptions::default()).build(Some(&exception), None, None);

    assert_eq!(envelope.type_name(), "HttpRequestError");
    assert_eq!(envelope.status_code(), 500);
}

#[test]
fn builder_prefixes_caller_info() {
    let exception = CapturedException::new("IoError", "boom").with_caller(CallerInfo {
        member: Some("save_order".to_string()),
        file: "src/orders.rs".to_string(),
        line: 42,
    });
    let envelope = builder(CaptureOptions::default()).build(Some(&exception), None, None);

    assert!(envelope.detail().starts_with("# caller: save_order in src/orders.rs:42\n"));
}

#[test]
fn builder_orders_server_variables_and_skips_cookie_header() {
    let mut request = RequestContext::new("GET", "/orders")
        .with_header("Accept", "text/html")
        .with_header("Cookie", "session=abc")
        .with_header("Accept", "application/json")
        .with_cookie("session", "abc")
        .with_query("page", "2")
        .with_user("alice");
    request.features.add("Protocol", "HTTP/1.1");
    request.user_claims.add("role", "admin");
    request.session.add("cart", "3");
    request.items.add("trace", "t-1");
    request.connection.add("RemoteIp", "10.0.0.1");

    let envelope = builder(CaptureOptions::default()).build(None, Some(&request), None);
    let names: Vec<&str> =
        envelope.server_variables().iter().map(|entry| entry.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "Protocol",
            "Header_Accept",
            "User_role",
            "Session_cart",
            "Items_trace",
            "Connection_RemoteIp",
            STATUS_CODE_VARIABLE,
        ]
    );
    assert_eq!(envelope.server_variables().get("Header_Accept"), Some("text/html,application/json"));
    assert_eq!(envelope.server_variables().get("Header_Cookie"), None);
    assert_eq!(envelope.cookies().and_then(|cookies| cookies.get("session")), Some("abc"));
    assert_eq!(envelope.query_string().and_then(|query| query.get("page")), Some("2"));
    assert_eq!(envelope.user(), "alice");
}

#[test]
fn builder_respects_cookie_and_form_switches() {
    let request = RequestContext::new("POST", "/login")
        .with_cookie("session", "abc")
        .with_form("user", "bob");
    let options = CaptureOptions {
        log_request_cookies: false,
        log_request_form: false,
        ..CaptureOptions::default()
    };
    let envelope = builder(options).build(None, Some(&request), None);

    assert!(envelope.cookies().is_none());
    assert!(envelope.form().is_none());
}

#[test]
fn builder_records_textual_body_only() {
    let options = CaptureOptions {
        log_request_body: true,
        ..CaptureOptions::default()
    };
    let mut json_request = RequestContext::new("POST", "/api");
    json_request.content_type = Some("application/json; charset=utf-8".to_string());
    let envelope = builder(options.clone()).build(None, Some(&json_request), Some("{\"a\":1}"));
    assert_eq!(envelope.form().and_then(|form| form.get(REQUEST_BODY_KEY)), Some("{\"a\":1}"));

    let mut binary_request = RequestContext::new("POST", "/upload");
    binary_request.content_type = Some("application/octet-stream".to_string());
    let envelope = builder(options.clone()).build(None, Some(&binary_request), Some("blob"));
    assert!(envelope.form().is_none());

    let mut chunked_request = RequestContext::new("POST", "/api");
    chunked_request.content_type = Some("text/plain".to_string());
    chunked_request.chunked = true;
    let envelope = builder(options).build(None, Some(&chunked_request), Some("hello"));
    assert!(envelope.form().is_none());
}

#[test]
fn builder_skips_failed_harvests() {
    let inner = RequestContext::new("GET", "/")
        .with_header("Accept", "text/html")
        .with_query("q", "1");
    let request = BrokenUserRequest(inner);
    let envelope = builder(CaptureOptions::default()).build(None, Some(&request), None);

    assert_eq!(envelope.user(), "");
    assert!(envelope.form().is_none());
    assert_eq!(envelope.server_variables().get("Header_Accept"), None);
    assert_eq!(envelope.query_string().and_then(|query| query.get("q")), Some("1"));
    assert_eq!(envelope.server_variables().get(STATUS_CODE_VARIABLE), Some("500"));
}

#[test]
fn builder_logs_skipped_accessors_at_debug() {
    let sink = SharedLog::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let request = BrokenUserRequest(RequestContext::new("GET", "/"));

    tracing::subscriber::with_default(subscriber, || {
        let _ = builder(CaptureOptions::default()).build(None, Some(&request), None);
    });

    let output = sink.contents();
    assert!(output.contains("skipping request accessor"));
    assert!(output.contains("headers already sent"));
    assert!(output.contains("form not buffered"));
    assert!(output.contains("no identity"));
    assert!(output.contains("session disabled"));
}

#[test]
fn builder_copies_request_log() {
    let log = Arc::new(RequestLog::new());
    log.add_message(LogMessage {
        time: OffsetDateTime::now_utc(),
        level: Some("warn".to_string()),
        scope: None,
        message: "retrying".to_string(),
        exception: None,
    });
    let trace = log.begin_sql("orders", "SELECT 1");
    log.finish_sql(trace);
    log.log_parameters(&[("order_id", json!(7))], "OrderService", "load");
    let request = RequestContext::new("GET", "/").with_log(Arc::clone(&log));

    let envelope = builder(CaptureOptions::default()).build(None, Some(&request), None);

    assert_eq!(envelope.messages().map(<[_]>::len), Some(1));
    let sql = envelope.sql_log().unwrap();
    assert_eq!(sql[0].command, "SELECT 1");
    assert!(sql[0].duration_ms.is_some());
    assert_eq!(envelope.params().unwrap()[0].params.get("order_id"), Some("7"));
}

#[test]
fn builder_omits_empty_request_log() {
    let request = RequestContext::new("GET", "/").with_log(Arc::new(RequestLog::new()));
    let envelope = builder(CaptureOptions::default()).build(None, Some(&request), None);

    assert!(envelope.messages().is_none());
    assert!(envelope.sql_log().is_none());
    assert!(envelope.params().is_none());
}

#[test]
fn from_error_walks_source_chain() {
    let outer = WrappedError {
        inner: std::io::Error::new(std::io::ErrorKind::NotFound, "config missing"),
    };
    let exception = CapturedException::from_error(&outer);

    assert!(exception.caller().is_some());
    assert_eq!(exception.type_name(), "WrappedError");
    assert_eq!(exception.message(), "failed to load settings");
    assert_eq!(exception.chain().count(), 2);
    assert_eq!(exception.base().message(), "config missing");
}

// ============================================================================
// SECTION: Codec
// ============================================================================

#[test]
fn encoded_envelope_omits_absent_collections() {
    let envelope = EnvelopeDraft::new("IoError", "boom").finish();
    let text = encode_envelope(&envelope).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "IoError");
    for key in ["query_string", "cookies", "form", "messages", "sql_log", "params"] {
        assert!(value.get(key).is_none(), "{key} should be omitted");
    }
    assert_eq!(decode_envelope(&text).unwrap(), envelope);
}

#[test]
fn decode_treats_present_but_empty_as_absent() {
    let id = error_archive_core::ErrorId::generate();
    let document = json!({
        "id": id.as_uuid().to_string(),
        "time": "2026-01-02T03:04:05+02:00",
        "application": "shop",
        "type": "IoError",
        "message": "boom",
        "query_string": [],
        "cookies": [],
        "form": [],
        "messages": [],
        "sql_log": [],
        "params": []
    });
    let envelope = decode_envelope(&document.to_string()).unwrap();

    assert_eq!(envelope.id(), id);
    assert_eq!(envelope.status_code(), 500);
    assert!(envelope.time().offset().is_utc());
    assert_eq!(envelope.time().hour(), 1);
    assert!(envelope.query_string().is_none());
    assert!(envelope.cookies().is_none());
    assert!(envelope.form().is_none());
    assert!(envelope.messages().is_none());
    assert!(envelope.sql_log().is_none());
    assert!(envelope.params().is_none());
}

#[test]
fn decode_rejects_malformed_documents() {
    assert!(decode_envelope("{\"id\": 3}").is_err());
    assert!(decode_envelope("not json").is_err());
}

#[test]
fn draft_assigns_unique_ids() {
    let first = EnvelopeDraft::new("A", "a").finish();
    let second = EnvelopeDraft::new("A", "a").finish();

    assert_ne!(first.id(), second.id());
    assert_eq!(first.id().to_string().len(), 32);
}

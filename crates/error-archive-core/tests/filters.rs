// crates/error-archive-core/tests/filters.rs
// ============================================================================
// Module: Filter Engine Tests
// Description: Property filters, search, assertion language, and decisions.
// Purpose: Ensure capture and retrieval filters decide deterministically.
// Dependencies: error-archive-core, proptest
// ============================================================================

//! Filter engine tests covering parsing, evaluation, and capture decisions.

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

use std::sync::Arc;

use error_archive_core::CapturedException;
use error_archive_core::EnvelopeDraft;
use error_archive_core::ErrorEnvelope;
use error_archive_core::ErrorFilterRule;
use error_archive_core::FilterChain;
use error_archive_core::PropertyFilter;
use error_archive_core::RequestContext;
use error_archive_core::SearchFilter;
use error_archive_core::filter::CaptureFilter;
use error_archive_core::filter::DslError;
use error_archive_core::filter::FilterContext;
use error_archive_core::filter::FilterError;
use error_archive_core::filter::FnFilter;
use error_archive_core::filter::PropertyField;
use error_archive_core::filter::PropertyOp;
use error_archive_core::filter::run_filters;
use error_archive_core::parse_assertion;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Envelope with a type, message, and status code.
fn envelope(type_name: &str, message: &str, status: u16) -> ErrorEnvelope {
    let mut draft = EnvelopeDraft::new(type_name, message);
    draft.status_code = status;
    draft.detail = format!("{type_name}: {message}\n   at handler");
    draft.user = "alice".to_string();
    draft.application = "shop".to_string();
    draft.server_variables.add("Header_User-Agent", "curl/8.0");
    draft.query_string.add("page", "2");
    draft.finish()
}

/// Evaluates a rule against an envelope without request context.
fn holds(rule: &str, envelope: &ErrorEnvelope) -> bool {
    parse_assertion(rule).unwrap().matches(&FilterContext::for_envelope(envelope))
}

// ============================================================================
// SECTION: Property Filters
// ============================================================================

#[test]
fn property_filter_parses_every_form() {
    let equals = PropertyFilter::parse("type:IoError").unwrap();
    assert_eq!(equals.field(), PropertyField::Type);
    assert_eq!(equals.op(), PropertyOp::Equals);
    assert_eq!(equals.value(), "IoError");

    let prefix = PropertyFilter::parse("message-prefix:disk").unwrap();
    assert_eq!(prefix.field(), PropertyField::Message);
    assert_eq!(prefix.op(), PropertyOp::Prefix);

    let contains = PropertyFilter::parse("status-code-contains:50").unwrap();
    assert_eq!(contains.field(), PropertyField::StatusCode);
    assert_eq!(contains.op(), PropertyOp::Contains);

    let status = PropertyFilter::parse("status-code:404").unwrap();
    assert_eq!(status.field(), PropertyField::StatusCode);
    assert_eq!(status.op(), PropertyOp::Equals);
}

#[test]
fn property_filter_rejects_malformed_input() {
    assert!(PropertyFilter::parse("type").is_none());
    assert!(PropertyFilter::parse("colour:red").is_none());
    assert!(PropertyFilter::parse("type-suffix:x").is_none());
    assert!(PropertyFilter::parse(":value").is_none());
}

#[test]
fn property_filter_display_round_trips() {
    for raw in ["type:IoError", "host-prefix:web", "user-contains:ali"] {
        assert_eq!(PropertyFilter::parse(raw).unwrap().to_string(), raw);
    }
}

#[test]
fn property_filter_matches_with_documented_case_rules() {
    let record = envelope("IoError", "Disk Full", 507);

    assert!(PropertyFilter::parse("type:IoError").unwrap().matches(&record));
    assert!(!PropertyFilter::parse("type:ioerror").unwrap().matches(&record));
    assert!(PropertyFilter::parse("message-prefix:Disk").unwrap().matches(&record));
    assert!(!PropertyFilter::parse("message-prefix:disk").unwrap().matches(&record));
    assert!(PropertyFilter::parse("message-contains:FULL").unwrap().matches(&record));
    assert!(PropertyFilter::parse("status-code:507").unwrap().matches(&record));
    assert!(PropertyFilter::parse("application:shop").unwrap().matches(&record));
}

// ============================================================================
// SECTION: Search and Chains
// ============================================================================

#[test]
fn search_filter_ignores_blank_text() {
    assert!(SearchFilter::new("").is_none());
    assert!(SearchFilter::new("   ").is_none());
}

#[test]
fn search_filter_scans_message_detail_and_type() {
    let record = envelope("TimeoutError", "upstream slow", 504);

    assert!(SearchFilter::new("SLOW").unwrap().matches(&record));
    assert!(SearchFilter::new("timeout").unwrap().matches(&record));
    assert!(SearchFilter::new("at handler").unwrap().matches(&record));
    assert!(!SearchFilter::new("database").unwrap().matches(&record));
}

#[test]
fn filter_chain_keeps_on_any_match() {
    let record = envelope("IoError", "disk full", 500);

    assert!(FilterChain::new().keeps(&record));

    let chain = FilterChain::new()
        .with(PropertyFilter::parse("type:TimeoutError").unwrap())
        .with(SearchFilter::new("disk").unwrap());
    assert!(chain.keeps(&record));

    let chain = FilterChain::new()
        .with(PropertyFilter::parse("type:TimeoutError").unwrap())
        .with(parse_assertion("status_code >= 501").unwrap());
    assert!(!chain.keeps(&record));
}

// ============================================================================
// SECTION: Assertion Language
// ============================================================================

#[test]
fn dsl_evaluates_comparisons_and_boolean_operators() {
    let record = envelope("IoError", "disk full", 507);

    assert!(holds(r#"type == "IoError" && status_code >= 500"#, &record));
    assert!(holds(r#"type == "Nope" || status_code == 507"#, &record));
    assert!(holds(r#"!(status_code < 500)"#, &record));
    assert!(holds(r#"not type == "Nope" and user == "alice""#, &record));
    assert!(holds(r#"message =~ "^disk +full$""#, &record));
    assert!(holds(r#"message ^= "disk" && message $= "full" && message *= "SK F""#, &record));
    assert!(holds(r#"header.User-Agent *= "curl""#, &record));
    assert!(holds(r#"query.page == 2"#, &record));
    assert!(holds(r#"server.Header_User-Agent ^= "curl/""#, &record));
    assert!(holds("at_least(2, status_code == 507, true, false)", &record));
    assert!(!holds("at_least(3, status_code == 507, true, false)", &record));
    assert!(holds("all(true, any(false, true))", &record));
}

#[test]
fn dsl_missing_values_only_satisfy_not_equal() {
    let record = envelope("IoError", "disk full", 500);

    assert!(!holds(r#"cookie.session == "abc""#, &record));
    assert!(!holds(r#"form.user ^= "a""#, &record));
    assert!(!holds(r#"method == "GET""#, &record));
    assert!(holds(r#"cookie.session != "abc""#, &record));
}

#[test]
fn dsl_type_mismatch_fails_open_to_no_match() {
    let record = envelope("IoError", "disk full", 500);

    let rule = parse_assertion("message > 3").unwrap();
    assert!(rule.eval(&FilterContext::for_envelope(&record)).is_err());
    assert!(!rule.matches(&FilterContext::for_envelope(&record)));
}

#[test]
fn dsl_reads_request_bindings() {
    let record = envelope("IoError", "disk full", 500);
    let request = RequestContext::new("POST", "/api/orders");
    let context = FilterContext {
        envelope: &record,
        exception: None,
        request: Some(&request),
    };

    assert!(parse_assertion(r#"method == "POST" && path ^= "/api""#).unwrap().matches(&context));
}

#[test]
fn dsl_is_type_walks_the_cause_chain() {
    let exception = CapturedException::new("HandlerError", "failed")
        .with_inner(CapturedException::new("TaskCanceled", "client went away"));
    let record = envelope("TaskCanceled", "client went away", 500);
    let context = FilterContext {
        envelope: &record,
        exception: Some(&exception),
        request: None,
    };

    assert!(parse_assertion(r#"is_type("HandlerError")"#).unwrap().matches(&context));
    assert!(parse_assertion(r#"is_type("TaskCanceled")"#).unwrap().matches(&context));
    assert!(!parse_assertion(r#"is_type("IoError")"#).unwrap().matches(&context));
}

#[test]
fn dsl_reports_syntax_errors() {
    assert!(matches!(parse_assertion(""), Err(DslError::EmptyInput)));
    assert!(matches!(parse_assertion("colour == 1"), Err(DslError::UnknownBinding { .. })));
    assert!(matches!(parse_assertion("explode(true)"), Err(DslError::UnknownFunction { .. })));
    assert!(matches!(parse_assertion(r#"type == "open"#), Err(DslError::UnterminatedString { .. })));
    assert!(matches!(parse_assertion(r#"message =~ "(""#), Err(DslError::InvalidPattern { .. })));
    assert!(matches!(parse_assertion("true true"), Err(DslError::TrailingInput { .. })));
    assert!(parse_assertion("(type == \"A\"").is_err());
}

#[test]
fn dsl_bounds_nesting_depth() {
    let deep = format!("{}true{}", "(".repeat(64), ")".repeat(64));
    assert!(matches!(parse_assertion(&deep), Err(DslError::NestingTooDeep { .. })));
}

proptest! {
    #[test]
    fn dsl_parser_never_panics(input in ".{0,256}") {
        let _ = parse_assertion(&input);
    }

    #[test]
    fn property_parser_never_panics(input in ".{0,128}") {
        let _ = PropertyFilter::parse(&input);
    }
}

// ============================================================================
// SECTION: Capture Decisions
// ============================================================================

#[test]
fn rule_without_notifiers_dismisses_matches() {
    let rule: Arc<dyn CaptureFilter> = Arc::new(ErrorFilterRule::new(
        "ignore-404",
        parse_assertion("status_code == 404").unwrap(),
        Vec::new(),
    ));
    let missing = envelope("NotFound", "no route", 404);
    let failing = envelope("IoError", "disk full", 500);

    let outcome = run_filters(&[Arc::clone(&rule)], FilterContext::for_envelope(&missing));
    assert!(outcome.discard);
    let outcome = run_filters(&[rule], FilterContext::for_envelope(&failing));
    assert!(!outcome.discard);
}

#[test]
fn rule_with_notifiers_retains_and_suppresses() {
    let dismiss_all: Arc<dyn CaptureFilter> =
        Arc::new(FnFilter::new("dismiss-all", |decision| {
            decision.dismiss();
            Ok(())
        }));
    let quiet_mail: Arc<dyn CaptureFilter> = Arc::new(ErrorFilterRule::new(
        "quiet-mail",
        parse_assertion(r#"type == "IoError""#).unwrap(),
        vec!["Mail".to_string()],
    ));
    let record = envelope("IoError", "disk full", 500);

    let outcome = run_filters(&[dismiss_all, quiet_mail], FilterContext::for_envelope(&record));

    assert!(!outcome.discard);
    assert!(outcome.suppressed.contains("mail"));
}

#[test]
fn failing_filter_does_not_stop_the_chain() {
    let broken: Arc<dyn CaptureFilter> = Arc::new(FnFilter::new("broken", |_| {
        Err(FilterError::Evaluation("lookup failed".to_string()))
    }));
    let mismatched: Arc<dyn CaptureFilter> = Arc::new(ErrorFilterRule::new(
        "mismatched",
        parse_assertion("message > 3").unwrap(),
        Vec::new(),
    ));
    let dismiss_io: Arc<dyn CaptureFilter> = Arc::new(ErrorFilterRule::new(
        "dismiss-io",
        parse_assertion(r#"type == "IoError""#).unwrap(),
        Vec::new(),
    ));
    let record = envelope("IoError", "disk full", 500);

    let outcome =
        run_filters(&[broken, mismatched, dismiss_io], FilterContext::for_envelope(&record));

    assert!(outcome.discard);
    assert!(outcome.suppressed.is_empty());
}

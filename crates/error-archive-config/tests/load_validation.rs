// crates/error-archive-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and model validation.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

//! Config load validation tests for error-archive-config.

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
use std::path::Path;

use error_archive_config::ConfigError;
use error_archive_config::ErrorArchiveConfig;
use error_archive_config::StoreType;
use tempfile::NamedTempFile;

/// Result alias for tests reporting a message.
type TestResult = Result<(), String>;

/// Checks that loading failed with a message containing `needle`.
fn assert_invalid(result: Result<ErrorArchiveConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

/// Writes `content` to a temp file.
fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(ErrorArchiveConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        ErrorArchiveConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'#'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(ErrorArchiveConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(ErrorArchiveConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let file = config_file("application_name = \"shop\"\nverbose = true\n");
    assert_invalid(ErrorArchiveConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn empty_file_yields_defaults() {
    let file = config_file("");

    let config = ErrorArchiveConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.application_name, None);
    assert_eq!(config.store.store_type, StoreType::Memory);
    assert!(config.capture.log_request_form);
    assert!(!config.capture.log_request_body);
    assert_eq!(config.source_path.as_deref(), Some(file.path()));
}

#[test]
fn full_config_parses() {
    let config = ErrorArchiveConfig::parse(
        r#"
application_name = "  shop  "

[capture]
log_request_body = true
log_request_cookies = false
host_name = "web-01"

[store]
type = "capped"
maximum_size = 50
ttl_seconds = 3600

[[filters]]
name = "ignore-404"
assertion = "status_code == 404"

[[filters]]
assertion = 'is_type("IoError")'
notifiers = [" mail "]
"#,
    )
    .unwrap();

    assert_eq!(config.application_name.as_deref(), Some("shop"));
    assert!(config.capture.log_request_body);
    assert!(!config.capture.log_request_cookies);
    assert_eq!(config.store.store_type, StoreType::Capped);
    assert_eq!(config.store.maximum_size, 50);
    assert_eq!(config.filters.len(), 2);
    let rules = config.filter_rules().unwrap();
    assert_eq!(rules[1].notifiers(), ["mail".to_string()]);
}

#[test]
fn store_settings_are_checked_per_type() -> TestResult {
    assert_invalid(ErrorArchiveConfig::parse("[store]\ntype = \"sqlite\"\n"), "sqlite store requires path")?;
    assert_invalid(
        ErrorArchiveConfig::parse("[store]\ntype = \"memory\"\npath = \"errors.db\"\n"),
        "memory store must not set path",
    )?;
    assert_invalid(
        ErrorArchiveConfig::parse("[store]\ntype = \"capped\"\nmaximum_size = 0\n"),
        "maximum_size must be greater than zero",
    )
}

#[test]
fn inline_filters_fail_closed() -> TestResult {
    assert_invalid(
        ErrorArchiveConfig::parse("[[filters]]\nname = \"bad\"\nassertion = \"bogus(\"\n"),
        "filter bad",
    )?;
    assert_invalid(ErrorArchiveConfig::parse("application_name = \"   \"\n"), "application_name must be non-empty")
}

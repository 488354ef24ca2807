// crates/error-archive-config/tests/filter_sources.rs
// =============================================================================
// Module: Filter Source Tests
// Description: Filter-definition file loading and pipeline wiring.
// Purpose: Ensure malformed entries are skipped and rules reach the pipeline.
// =============================================================================

//! Filter-definition source and wiring tests for error-archive-config.

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

use std::fs;

use error_archive_config::ConfigError;
use error_archive_config::ErrorArchiveConfig;
use error_archive_config::parse_filter_definitions;
use error_archive_core::CancelSignal;
use error_archive_core::CaptureFilter;
use error_archive_core::CapturedException;
use error_archive_core::FilterChain;
use error_archive_core::runtime::CaptureState;
use tempfile::TempDir;

#[test]
fn malformed_entries_are_skipped() {
    let rules = parse_filter_definitions(
        r#"
[[filter]]
name = "cancellations"
assertion = 'is_type("TaskCanceled")'

[[filter]]
name = "no-assertion"

[[filter]]
name = "bad-syntax"
assertion = "type =="

[[filter]]
assertion = "status_code >= 500"
notifiers = ["mail"]
"#,
    )
    .unwrap();

    let names: Vec<&str> = rules.iter().map(CaptureFilter::name).collect();
    assert_eq!(names, vec!["cancellations", "filter-3"]);
}

#[test]
fn invalid_toml_is_an_error() {
    let result = parse_filter_definitions("[[filter]\nassertion = ");
    assert!(matches!(result, Err(ConfigError::Parse(_))));

    let result = parse_filter_definitions("filter = \"nope\"\n");
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    assert!(parse_filter_definitions("").unwrap().is_empty());
}

#[tokio::test]
async fn config_wires_store_and_filters_into_pipeline() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("filters.toml"), "[[filter]]\nassertion = 'is_type(\"TaskCanceled\")'\n").unwrap();
    let config_path = dir.path().join("error-archive.toml");
    let database = dir.path().join("errors.sqlite");
    fs::write(
        &config_path,
        format!(
            "application_name = \"shop\"\nfilters_file = \"filters.toml\"\n\n[store]\ntype = \"sqlite\"\npath = {:?}\n",
            database.to_string_lossy()
        ),
    )
    .unwrap();
    let config = ErrorArchiveConfig::load(Some(&config_path)).unwrap();
    let pipeline = config.pipeline_builder().unwrap().build().unwrap();

    let dismissed = pipeline
        .capture_detailed(Some(&CapturedException::new("TaskCanceled", "stop")), None, None, &CancelSignal::never())
        .await;
    let kept = pipeline
        .capture(Some(&CapturedException::new("IoError", "disk full")), None, None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(dismissed.state, CaptureState::Discarded);
    assert_eq!(kept.store, "SQLite Error Log");
    let log = config.error_log().unwrap();
    let page = log.get_page(&FilterChain::new(), 0, 10, &CancelSignal::never()).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].envelope().application(), "shop");
}

#[tokio::test]
async fn unreadable_filter_file_keeps_inline_rules() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.toml"), "[[filter]\nassertion = ").unwrap();
    for filters_file in ["absent.toml", "broken.toml"] {
        let config_path = dir.path().join("error-archive.toml");
        fs::write(
            &config_path,
            format!(
                "application_name = \"filters-{filters_file}\"\nfilters_file = \"{filters_file}\"\n\n[[filters]]\nname = \"cancellations\"\nassertion = 'is_type(\"TaskCanceled\")'\n"
            ),
        )
        .unwrap();
        let config = ErrorArchiveConfig::load(Some(&config_path)).unwrap();

        let names: Vec<String> =
            config.filter_rules().unwrap().iter().map(|rule| rule.name().to_string()).collect();
        assert_eq!(names, vec!["cancellations".to_string()]);

        let pipeline = config.pipeline_builder().unwrap().build().unwrap();
        let report = pipeline
            .capture_detailed(Some(&CapturedException::new("TaskCanceled", "stop")), None, None, &CancelSignal::never())
            .await;
        assert_eq!(report.state, CaptureState::Discarded);
    }
    assert!(matches!(
        error_archive_config::load_filter_file(&dir.path().join("absent.toml")),
        Err(ConfigError::Io(_))
    ));
}

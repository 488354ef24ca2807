// crates/error-archive-config/src/filters.rs
// ============================================================================
// Module: Filter Definition Source
// Description: Loads capture filter rules from a TOML definition file.
// Purpose: Let operators maintain filter rules outside the main config.
// Dependencies: error-archive-core, serde, toml, tracing
// ============================================================================

//! ## Overview
//! A filter-definition file holds `[[filter]]` entries, each with an
//! `assertion` expression and optional `name` and `notifiers`. The file as a
//! whole must be valid TOML within the size limit; individual entries that
//! fail to decode or whose assertion does not parse are skipped with a
//! warning.
//!
//! ```toml
//! [[filter]]
//! name = "ignore-cancellations"
//! assertion = 'is_type("TaskCanceled")'
//!
//! [[filter]]
//! assertion = 'status_code == 404'
//! notifiers = ["mail"]
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use error_archive_core::ErrorFilterRule;

use crate::config::ConfigError;
use crate::config::FilterRuleConfig;
use crate::config::read_bounded_text;

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads rules from a filter-definition file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or is not valid TOML.
pub fn load_filter_file(path: &Path) -> Result<Vec<ErrorFilterRule>, ConfigError> {
    let content = read_bounded_text(path, "filters")?;
    parse_filter_definitions(&content)
}

/// Parses filter-definition text, skipping malformed entries.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the text is not valid TOML and
/// [`ConfigError::Invalid`] when `filter` is not an array of tables.
pub fn parse_filter_definitions(content: &str) -> Result<Vec<ErrorFilterRule>, ConfigError> {
    let table: toml::Table = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let Some(entries) = table.get("filter") else {
        return Ok(Vec::new());
    };
    let toml::Value::Array(entries) = entries else {
        return Err(ConfigError::Invalid("filter must be an array of tables".to_string()));
    };
    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let definition = match entry.clone().try_into::<FilterRuleConfig>() {
            Ok(definition) => definition,
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed filter definition");
                continue;
            }
        };
        match definition.to_rule(index) {
            Ok(rule) => rules.push(rule),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping invalid filter definition");
            }
        }
    }
    Ok(rules)
}

// crates/error-archive-config/src/config.rs
// ============================================================================
// Module: Error Archive Configuration
// Description: Configuration loading and validation for the error archive.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: error-archive-core, error-archive-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, then `ERROR_ARCHIVE_CONFIG`, then
//! `error-archive.toml` in the working directory. Invalid configuration fails
//! closed; only entries of a separate filter-definition file are skipped
//! individually.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use error_archive_core::CaptureOptions;
use error_archive_core::ErrorFilterRule;
use error_archive_core::parse_assertion;
use error_archive_store_sqlite::SqliteStoreMode;
use error_archive_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "error-archive.toml";
/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "ERROR_ARCHIVE_CONFIG";
/// Maximum configuration or filter file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum application name length.
const MAX_APPLICATION_NAME_LENGTH: usize = 256;
/// Maximum number of inline filter rules.
const MAX_FILTER_RULES: usize = 256;
/// Default `SQLite` busy timeout (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default capped store size.
const DEFAULT_CAPPED_MAXIMUM_SIZE: usize = 200;
/// Default capped index list prefix.
const DEFAULT_LIST_PREFIX: &str = "error-archive:list:";
/// Default capped blob prefix.
const DEFAULT_BLOB_PREFIX: &str = "error-archive:error:";

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Root configuration.
///
/// # Invariants
/// - A loaded config has passed [`ErrorArchiveConfig::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorArchiveConfig {
    /// Application scope name; the executable name is used when absent.
    #[serde(default)]
    pub application_name: Option<String>,
    /// Envelope recording options.
    #[serde(default)]
    pub capture: CaptureOptions,
    /// Error store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Inline capture filter rules.
    #[serde(default)]
    pub filters: Vec<FilterRuleConfig>,
    /// Optional filter-definition file.
    #[serde(default)]
    pub filters_file: Option<PathBuf>,
    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl ErrorArchiveConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let content = read_bounded_text(&resolved, "config")?;
        let mut config = Self::parse(&content)?;
        config.source_path = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if let Some(name) = &self.application_name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid("application_name must be non-empty".to_string()));
            }
            if trimmed.len() > MAX_APPLICATION_NAME_LENGTH {
                return Err(ConfigError::Invalid("application_name exceeds max length".to_string()));
            }
            self.application_name = Some(trimmed.to_string());
        }
        if let Some(host) = &self.capture.host_name
            && host.trim().is_empty()
        {
            return Err(ConfigError::Invalid("capture.host_name must be non-empty".to_string()));
        }
        self.store.validate()?;
        if self.filters.len() > MAX_FILTER_RULES {
            return Err(ConfigError::Invalid("too many filters".to_string()));
        }
        for (index, filter) in self.filters.iter().enumerate() {
            filter.to_rule(index)?;
        }
        if let Some(path) = &self.filters_file {
            validate_path_string("filters_file", &path.to_string_lossy())?;
        }
        Ok(())
    }

    /// Returns the filter-definition file path, resolved against the config
    /// file's directory when relative.
    #[must_use]
    pub fn resolved_filters_file(&self) -> Option<PathBuf> {
        let path = self.filters_file.as_ref()?;
        if path.is_absolute() {
            return Some(path.clone());
        }
        let base = self.source_path.as_ref().and_then(|source| source.parent());
        Some(base.map_or_else(|| path.clone(), |base| base.join(path)))
    }

    /// Returns inline rules followed by the rules of the filter file.
    ///
    /// A filter file that cannot be read or parsed is logged and skipped so
    /// the inline rules still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an inline rule is invalid.
    pub fn filter_rules(&self) -> Result<Vec<ErrorFilterRule>, ConfigError> {
        let mut rules = self
            .filters
            .iter()
            .enumerate()
            .map(|(index, filter)| filter.to_rule(index))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(path) = self.resolved_filters_file() {
            match crate::filters::load_filter_file(&path) {
                Ok(file_rules) => rules.extend(file_rules),
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "error in filters file; using inline filters only");
                }
            }
        }
        Ok(rules)
    }
}

// ============================================================================
// SECTION: Filter Rules
// ============================================================================

/// One filter rule definition.
///
/// # Invariants
/// - `assertion` must parse with the filter expression language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRuleConfig {
    /// Diagnostic label.
    #[serde(default)]
    pub name: Option<String>,
    /// Filter expression.
    pub assertion: String,
    /// Notifiers to suppress on match; empty dismisses the error.
    #[serde(default)]
    pub notifiers: Vec<String>,
}

impl FilterRuleConfig {
    /// Builds the runtime rule; unnamed rules are labelled by position.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the assertion or a notifier name
    /// is invalid.
    pub fn to_rule(&self, index: usize) -> Result<ErrorFilterRule, ConfigError> {
        let name = self.name.clone().unwrap_or_else(|| format!("filter-{index}"));
        let assertion = parse_assertion(&self.assertion)
            .map_err(|err| ConfigError::Invalid(format!("filter {name}: {err}")))?;
        if self.notifiers.iter().any(|notifier| notifier.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("filter {name}: notifier names must be non-empty")));
        }
        let notifiers = self.notifiers.iter().map(|notifier| notifier.trim().to_string()).collect();
        Ok(ErrorFilterRule::new(name, assertion, notifiers))
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Error store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Create the `SQLite` schema when missing.
    #[serde(default = "default_true")]
    pub create_tables: bool,
    /// Capped store: errors kept per application.
    #[serde(default = "default_capped_maximum_size")]
    pub maximum_size: usize,
    /// Capped store: index list key prefix.
    #[serde(default = "default_list_prefix")]
    pub list_prefix: String,
    /// Capped store: blob key prefix.
    #[serde(default = "default_blob_prefix")]
    pub blob_prefix: String,
    /// Capped store: blob time-to-live in seconds.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            create_tables: true,
            maximum_size: default_capped_maximum_size(),
            list_prefix: default_list_prefix(),
            blob_prefix: default_blob_prefix(),
            ttl_seconds: None,
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
            StoreType::Capped => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("capped store must not set path".to_string()));
                }
                if self.maximum_size == 0 {
                    return Err(ConfigError::Invalid(
                        "capped store maximum_size must be greater than zero".to_string(),
                    ));
                }
                if self.ttl_seconds == Some(0) {
                    return Err(ConfigError::Invalid(
                        "capped store ttl_seconds must be greater than zero".to_string(),
                    ));
                }
                if self.list_prefix.trim().is_empty() || self.blob_prefix.trim().is_empty() {
                    return Err(ConfigError::Invalid("capped store prefixes must be non-empty".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Error store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the process-wide in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
    /// Use the capped list store over the in-process driver.
    Capped,
}

/// Returns the default busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default capped store size.
const fn default_capped_maximum_size() -> usize {
    DEFAULT_CAPPED_MAXIMUM_SIZE
}

/// Returns `true`.
const fn default_true() -> bool {
    true
}

/// Returns the default list prefix.
fn default_list_prefix() -> String {
    DEFAULT_LIST_PREFIX.to_string()
}

/// Returns the default blob prefix.
fn default_blob_prefix() -> String {
    DEFAULT_BLOB_PREFIX.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against security limits.
fn validate_path(path: &Path, label: &str) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{label} path exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{label} path component too long")));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Reads a size-limited UTF-8 file; `label` prefixes error messages.
pub(crate) fn read_bounded_text(path: &Path, label: &str) -> Result<String, ConfigError> {
    validate_path(path, label)?;
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid(format!("{label} file exceeds size limit")));
    }
    String::from_utf8(bytes).map_err(|_| ConfigError::Invalid(format!("{label} file must be utf-8")))
}

// crates/error-archive-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Error Store
// Description: Durable ErrorStore backed by a single SQLite table.
// Purpose: Persist archived errors with native newest-first pagination.
// Dependencies: error-archive-core, rusqlite, serde, thiserror, tokio
// ============================================================================

//! ## Overview
//! This module implements a durable [`ErrorStore`] using `SQLite`. Each append
//! inserts one row holding the JSON envelope plus the indexed columns used for
//! ordering. The schema is ensured on first use behind a per-instance
//! once-cell: concurrent first callers wait for a single check, and a failed
//! check is retried by the next caller.
//!
//! Unfiltered pages use `OFFSET`/`LIMIT` in SQL. Filtered pages decode rows in
//! order and apply the chain in process. Blocking database calls run on the
//! tokio blocking pool and are awaited inline.
//! Security posture: database contents are untrusted; rows that fail to decode
//! are reported as corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use error_archive_core::CancelSignal;
use error_archive_core::ErrorEnvelope;
use error_archive_core::ErrorId;
use error_archive_core::ErrorPage;
use error_archive_core::ErrorRecord;
use error_archive_core::ErrorStore;
use error_archive_core::FilterChain;
use error_archive_core::StoreError;
use error_archive_core::core::CodecError;
use error_archive_core::core::decode_envelope;
use error_archive_core::core::encode_envelope;
use error_archive_core::interfaces::check_cancelled;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store name stamped onto records.
pub const SQLITE_STORE_NAME: &str = "SQLite Error Log";
/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` error store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - With `create_tables` off, the `errors` table must already exist.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Create the schema when it is missing.
    #[serde(default = "default_create_tables")]
    pub create_tables: bool,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            create_tables: true,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default table-creation switch.
const fn default_create_tables() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw envelope payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row fails to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or request.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Transport(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Store(format!("schema version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed error store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - Clones share the connection and the schema-ready flag.
#[derive(Clone)]
pub struct SqliteErrorStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Set once the schema check succeeded.
    schema_ready: Arc<OnceCell<()>>,
    /// Number of schema checks started.
    schema_checks: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SqliteErrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteErrorStore")
            .field("path", &self.config.path)
            .field("schema_ready", &self.schema_ready.initialized())
            .finish_non_exhaustive()
    }
}

impl SqliteErrorStore {
    /// Opens an `SQLite`-backed error store.
    ///
    /// The schema is not touched until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(&config)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
            schema_ready: Arc::new(OnceCell::new()),
            schema_checks: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns how many schema checks have started.
    #[must_use]
    pub fn schema_checks(&self) -> usize {
        self.schema_checks.load(Ordering::SeqCst)
    }

    /// Ensures the schema exists, running the check at most once on success.
    async fn ensure_schema(&self) -> Result<(), SqliteStoreError> {
        self.schema_ready
            .get_or_try_init(|| async {
                self.schema_checks.fetch_add(1, Ordering::SeqCst);
                let create_tables = self.config.create_tables;
                self.with_connection(move |connection| initialize_schema(connection, create_tables))
                    .await
            })
            .await?;
        Ok(())
    }

    /// Runs a blocking operation against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, operation: F) -> Result<T, SqliteStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))?;
            operation(&mut guard)
        })
        .await
        .map_err(|err| SqliteStoreError::Io(format!("sqlite worker failed: {err}")))?
    }

    /// Ensures the schema, then checks cancellation before the round-trip.
    async fn ready(&self, cancel: &CancelSignal) -> Result<(), StoreError> {
        check_cancelled(cancel)?;
        self.ensure_schema().await?;
        check_cancelled(cancel)
    }
}

#[async_trait]
impl ErrorStore for SqliteErrorStore {
    fn name(&self) -> &str {
        SQLITE_STORE_NAME
    }

    async fn append(&self, envelope: &ErrorEnvelope, cancel: &CancelSignal) -> Result<ErrorId, StoreError> {
        self.ready(cancel).await?;
        let row = ErrorRow::from_envelope(envelope)?;
        self.with_connection(move |connection| insert_row(connection, &row)).await?;
        Ok(envelope.id())
    }

    async fn get_one(
        &self,
        application: &str,
        id: ErrorId,
        cancel: &CancelSignal,
    ) -> Result<Option<ErrorRecord>, StoreError> {
        self.ready(cancel).await?;
        let application = application.to_string();
        let json = self
            .with_connection(move |connection| {
                connection
                    .query_row(
                        "SELECT envelope_json FROM errors WHERE application = ?1 AND error_id = ?2",
                        params![application, id.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()
                    .map_err(SqliteStoreError::from)
            })
            .await?;
        json.map(|json| decode_row(&json).map(|envelope| ErrorRecord::new(SQLITE_STORE_NAME, envelope)))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn get_page(
        &self,
        application: &str,
        filters: &FilterChain,
        offset: usize,
        page_size: usize,
        cancel: &CancelSignal,
    ) -> Result<ErrorPage, StoreError> {
        self.ready(cancel).await?;
        let application = application.to_string();
        if filters.is_empty() {
            let limit = to_sql_count(page_size)?;
            let skip = to_sql_count(offset)?;
            let (total, rows) = self
                .with_connection(move |connection| query_native_page(connection, &application, skip, limit))
                .await?;
            let records = rows
                .iter()
                .map(|json| decode_row(json).map(|envelope| ErrorRecord::new(SQLITE_STORE_NAME, envelope)))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ErrorPage {
                total_count: usize::try_from(total).unwrap_or(0),
                records,
            });
        }

        let rows = self.with_connection(move |connection| query_all(connection, &application)).await?;
        let mut total_count = 0usize;
        let mut records = Vec::new();
        for json in &rows {
            let envelope = decode_row(json)?;
            if !filters.keeps(&envelope) {
                continue;
            }
            if total_count >= offset && records.len() < page_size {
                records.push(ErrorRecord::new(SQLITE_STORE_NAME, envelope));
            }
            total_count += 1;
        }
        Ok(ErrorPage {
            total_count,
            records,
        })
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Column values for one inserted error.
#[derive(Debug, Clone)]
struct ErrorRow {
    /// Error identifier in simple form.
    error_id: String,
    /// Application scope.
    application: String,
    /// Host name.
    host: String,
    /// Error type name.
    type_name: String,
    /// Error source.
    source: String,
    /// Error message.
    message: String,
    /// User name.
    user_name: String,
    /// HTTP status code.
    status_code: i64,
    /// Creation time as unix nanoseconds.
    time_utc: i64,
    /// Encoded envelope.
    envelope_json: String,
}

impl ErrorRow {
    /// Extracts column values and encodes the envelope.
    fn from_envelope(envelope: &ErrorEnvelope) -> Result<Self, SqliteStoreError> {
        let envelope_json = encode_envelope(envelope).map_err(|err| match err {
            CodecError::TooLarge { .. } => SqliteStoreError::Invalid(err.to_string()),
            CodecError::Encode(_) | CodecError::Decode(_) => SqliteStoreError::Corrupt(err.to_string()),
        })?;
        Ok(Self {
            error_id: envelope.id().to_string(),
            application: envelope.application().to_string(),
            host: envelope.host().to_string(),
            type_name: envelope.type_name().to_string(),
            source: envelope.source().to_string(),
            message: envelope.message().to_string(),
            user_name: envelope.user().to_string(),
            status_code: i64::from(envelope.status_code()),
            time_utc: i64::try_from(envelope.time().unix_timestamp_nanos()).unwrap_or(i64::MAX),
            envelope_json,
        })
    }
}

/// Inserts one row; `sequence` is assigned by the database.
fn insert_row(connection: &mut Connection, row: &ErrorRow) -> Result<(), SqliteStoreError> {
    connection.execute(
        "INSERT INTO errors (error_id, application, host, type_name, source, message, user_name, \
         status_code, time_utc, envelope_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.error_id,
            row.application,
            row.host,
            row.type_name,
            row.source,
            row.message,
            row.user_name,
            row.status_code,
            row.time_utc,
            row.envelope_json,
        ],
    )?;
    Ok(())
}

/// Counts and pages an application's rows in SQL.
fn query_native_page(
    connection: &mut Connection,
    application: &str,
    offset: i64,
    limit: i64,
) -> Result<(i64, Vec<String>), SqliteStoreError> {
    let tx = connection.transaction()?;
    let total: i64 = tx.query_row(
        "SELECT COUNT(1) FROM errors WHERE application = ?1",
        params![application],
        |row| row.get(0),
    )?;
    let rows = {
        let mut statement = tx.prepare(
            "SELECT envelope_json FROM errors WHERE application = ?1 ORDER BY time_utc DESC, \
             sequence DESC LIMIT ?2 OFFSET ?3",
        )?;
        let mapped = statement.query_map(params![application, limit, offset], |row| row.get(0))?;
        mapped.collect::<Result<Vec<String>, _>>()?
    };
    tx.commit()?;
    Ok((total, rows))
}

/// Reads every row of an application, newest first.
fn query_all(connection: &mut Connection, application: &str) -> Result<Vec<String>, SqliteStoreError> {
    let mut statement = connection.prepare(
        "SELECT envelope_json FROM errors WHERE application = ?1 ORDER BY time_utc DESC, sequence \
         DESC",
    )?;
    let mapped = statement.query_map(params![application], |row| row.get(0))?;
    let rows = mapped.collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// Decodes a stored envelope.
fn decode_row(json: &str) -> Result<ErrorEnvelope, SqliteStoreError> {
    decode_envelope(json).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Converts a count to an SQL integer.
fn to_sql_count(value: usize) -> Result<i64, SqliteStoreError> {
    i64::try_from(value).map_err(|_| SqliteStoreError::Invalid(format!("count out of range: {value}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Creates or validates the schema.
fn initialize_schema(connection: &mut Connection, create_tables: bool) -> Result<(), SqliteStoreError> {
    if !create_tables {
        let exists: Option<String> = connection
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'errors'",
                params![],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(SqliteStoreError::Invalid(
                "errors table is missing and create_tables is disabled".to_string(),
            ));
        }
        return Ok(());
    }
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS errors (
                    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                    error_id TEXT NOT NULL UNIQUE,
                    application TEXT NOT NULL,
                    host TEXT NOT NULL,
                    type_name TEXT NOT NULL,
                    source TEXT NOT NULL,
                    message TEXT NOT NULL,
                    user_name TEXT NOT NULL,
                    status_code INTEGER NOT NULL,
                    time_utc INTEGER NOT NULL,
                    envelope_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_errors_application_time
                    ON errors (application, time_utc DESC, sequence DESC);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    tracing::debug!("sqlite error store schema ready");
    Ok(())
}

// crates/error-archive-cli/src/main.rs
// ============================================================================
// Module: Error Archive CLI Entry Point
// Description: Command dispatcher for browsing error archives.
// Purpose: List, show, and poll archived errors and validate configuration.
// Dependencies: clap, error-archive-config, error-archive-core, tokio,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! The `error-archive` CLI opens the store named by `error-archive.toml` and
//! browses it through the retrieval query surface. Output is plain text or
//! JSON. Diagnostics go to stderr through `tracing`, filtered by
//! `ERROR_ARCHIVE_LOG`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use error_archive_config::ErrorArchiveConfig;
use error_archive_config::load_filter_file;
use error_archive_core::CancelSignal;
use error_archive_core::ErrorId;
use error_archive_core::ErrorLog;
use error_archive_core::ErrorQuery;
use error_archive_core::ErrorRecord;
use error_archive_core::ErrorsList;
use error_archive_core::new_errors_since;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the diagnostic filter.
const LOG_ENV: &str = "ERROR_ARCHIVE_LOG";
/// Default page size for `list`.
const DEFAULT_PAGE_SIZE: i64 = 20;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "error-archive", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Config file path (overrides `ERROR_ARCHIVE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List archived errors, newest first.
    List(ListCommand),
    /// Show one archived error.
    Show(ShowCommand),
    /// List errors newer than a known identifier.
    NewSince(NewSinceCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON document.
    Json,
}

/// Filter arguments shared by listing commands.
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Property filter such as `type:IoError` (repeatable).
    #[arg(long = "filter", value_name = "FILTER")]
    filters: Vec<String>,
    /// Free-text search.
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
struct ListCommand {
    /// Matches to skip.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    offset: i64,
    /// Page size (at most 100).
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, allow_hyphen_values = true)]
    page_size: i64,
    /// Filters.
    #[command(flatten)]
    filters: FilterArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
struct ShowCommand {
    /// Error identifier.
    id: String,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `new-since`.
#[derive(Args, Debug)]
struct NewSinceCommand {
    /// Last identifier already seen.
    #[arg(long, value_name = "ID")]
    since: Option<String>,
    /// Filters.
    #[command(flatten)]
    filters: FilterArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration and filter file.
    Validate,
}

/// CLI error wrapper for user-facing failures.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Installs the stderr diagnostic subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        write_stdout_line(&format!("error-archive {}", env!("CARGO_PKG_VERSION")))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        let help = Cli::command().render_help().to_string();
        write_stdout_line(&help)?;
        return Ok(ExitCode::SUCCESS);
    };
    let config = ErrorArchiveConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    tracing::debug!(source = ?config.source_path, store = ?config.store.store_type, "loaded config");

    match command {
        Commands::List(command) => command_list(&config, &command).await,
        Commands::Show(command) => command_show(&config, &command).await,
        Commands::NewSince(command) => command_new_since(&config, &command).await,
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(&config),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `list`.
async fn command_list(config: &ErrorArchiveConfig, command: &ListCommand) -> CliResult<ExitCode> {
    let log = open_log(config)?;
    let query = build_query(&command.filters, command.offset, command.page_size);
    let list = query.run(&log, &CancelSignal::never()).await;
    emit_list(&list, command.format)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `show`.
async fn command_show(config: &ErrorArchiveConfig, command: &ShowCommand) -> CliResult<ExitCode> {
    let id = ErrorId::parse(&command.id)
        .ok_or_else(|| CliError::new(format!("invalid error id: {}", command.id)))?;
    let log = open_log(config)?;
    let Some(record) = log.get_one(id, &CancelSignal::never()).await else {
        return Err(CliError::new(format!("error not found: {id}")));
    };
    match command.format {
        OutputFormat::Text => write_stdout_line(&render_record_text(&record)),
        OutputFormat::Json => write_json(&record),
    }?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `new-since`.
async fn command_new_since(config: &ErrorArchiveConfig, command: &NewSinceCommand) -> CliResult<ExitCode> {
    let log = open_log(config)?;
    let chain = build_query(&command.filters, 0, 0).filter_chain();
    let list = new_errors_since(&log, &chain, command.since.as_deref(), &CancelSignal::never()).await;
    emit_list(&list, command.format)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`.
fn command_config_validate(config: &ErrorArchiveConfig) -> CliResult<ExitCode> {
    let rules = config
        .filter_rules()
        .map_err(|err| CliError::new(format!("failed to load filters: {err}")))?;
    if let Some(path) = config.resolved_filters_file() {
        load_filter_file(&path)
            .map_err(|err| CliError::new(format!("failed to load filters file {}: {err}", path.display())))?;
    }
    write_stdout_line(&format!("config ok ({} filter rules)", rules.len()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the configured store.
fn open_log(config: &ErrorArchiveConfig) -> CliResult<ErrorLog> {
    config.error_log().map_err(|err| CliError::new(format!("failed to open store: {err}")))
}

/// Builds a query from shared filter arguments.
fn build_query(filters: &FilterArgs, offset: i64, page_size: i64) -> ErrorQuery {
    ErrorQuery {
        property_filters: filters.filters.clone(),
        search: filters.search.clone(),
        offset,
        page_size,
    }
}

/// Writes a list in the requested format.
fn emit_list(list: &ErrorsList, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Text => write_stdout_line(&render_list_text(list)),
        OutputFormat::Json => write_json(list),
    }
}

/// Renders a list as one line per error after a count header.
fn render_list_text(list: &ErrorsList) -> String {
    let mut text = format!("{} error(s) in scope, showing {}", list.total_count, list.errors.len());
    for record in &list.errors {
        let envelope = record.envelope();
        let time = envelope.time().format(&Rfc3339).unwrap_or_default();
        let _ = write!(
            text,
            "\n{}  {}  {}  {}",
            record.id(),
            time,
            envelope.type_name(),
            first_line(envelope.message())
        );
    }
    text
}

/// Renders one record with its detail.
fn render_record_text(record: &ErrorRecord) -> String {
    let envelope = record.envelope();
    let time = envelope.time().format(&Rfc3339).unwrap_or_default();
    let mut text = format!("{}: {}", envelope.type_name(), envelope.message());
    let _ = write!(text, "\nid: {}", record.id());
    let _ = write!(text, "\nstore: {}", record.store());
    let _ = write!(text, "\napplication: {}", envelope.application());
    let _ = write!(text, "\nhost: {}", envelope.host());
    let _ = write!(text, "\ntime: {time}");
    let _ = write!(text, "\nstatus: {}", envelope.status_code());
    if !envelope.user().is_empty() {
        let _ = write!(text, "\nuser: {}", envelope.user());
    }
    if !envelope.detail().is_empty() {
        let _ = write!(text, "\n\n{}", envelope.detail());
    }
    text
}

/// Returns the first line of `text`.
fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Writes a pretty JSON document to stdout.
fn write_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&json)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

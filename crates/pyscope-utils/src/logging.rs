//! # Logging Utilities
//!
//! Logging infrastructure for pyscope using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty (development) and JSON (machine) output formats
//! - Environment variable configuration
//! - An optional daily-rolling log file next to the console output
//!
//! Console output always goes to **stderr**; stdout belongs to the stacks
//! the CLI prints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pyscope_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should reach the file
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=pyscope_core::lines=trace`)
//! - `PYSCOPE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `PYSCOPE_LOG_FILE`: Optional path to a log file (rotated daily)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_VAR: &str = "PYSCOPE_LOG_FORMAT";

/// Environment variable naming an optional log file.
pub const LOG_FILE_VAR: &str = "PYSCOPE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!("{s}. Use 'pretty' or 'json'"))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Everything needed to install the global subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings
{
    /// Explicit level. When `None`, `RUST_LOG` decides, then `INFO`.
    pub level: Option<LogLevel>,
    /// Output format for both console and file
    pub format: LogFormat,
    /// Optional log file, rotated daily
    pub file: Option<PathBuf>,
}

impl LogSettings
{
    /// Settings from `PYSCOPE_LOG_FORMAT` and `PYSCOPE_LOG_FILE`.
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` when `PYSCOPE_LOG_FORMAT` is set to something unknown.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` when the format variable is set to something unknown.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggingError>
    {
        let format = match lookup(LOG_FORMAT_VAR) {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };
        let file = lookup(LOG_FILE_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            level: None,
            format,
            file,
        })
    }

    /// Override the level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    /// Override the format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    /// The filter this configuration produces.
    ///
    /// Priority:
    /// 1. An explicit level (from a `--log-level` flag)
    /// 2. `RUST_LOG`, which may hold per-module directives
    /// 3. `INFO`
    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            EnvFilter::new(Level::from(level).to_string())
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
        }
    }
}

/// Keeps the background file writer alive
///
/// Dropping the guard flushes and stops file logging. Console logging is
/// unaffected.
#[must_use = "file logging stops when the guard is dropped"]
#[derive(Debug)]
pub struct LoggingGuard
{
    file: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// `true` when a file layer was installed.
    pub fn has_file(&self) -> bool
    {
        self.file.is_some()
    }
}

/// Initialize logging from the environment
///
/// ## Example
///
/// ```rust,no_run
/// use pyscope_utils::init_logging;
///
/// let _guard = init_logging().expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `PYSCOPE_LOG_FORMAT` holds an unknown format
/// - The log file directory cannot be created
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_with_settings(&LogSettings::from_env()?)
}

/// Initialize logging with explicit settings
///
/// ## Example
///
/// ```rust,no_run
/// use pyscope_utils::{init_logging_with_settings, LogFormat, LogLevel, LogSettings};
///
/// let settings = LogSettings::default().with_level(LogLevel::Debug).with_format(LogFormat::Json);
/// let _guard = init_logging_with_settings(&settings).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_settings(settings: &LogSettings) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = vec![format_layer(settings.format, io::stderr, true, settings.filter())];

    let guard = match &settings.file {
        Some(path) => {
            let (directory, file_name) = split_log_path(path)?;
            std::fs::create_dir_all(&directory)?;
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            // No ANSI in files
            layers.push(format_layer(settings.format, non_blocking, false, settings.filter()));
            Some(guard)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok(LoggingGuard { file: guard })
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Split a log path into the directory the appender writes to and the file
/// name prefix it rotates.
fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError>
{
    let file_name = path.file_name().ok_or_else(|| {
        LoggingError::FileError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log file path has no file name: {}", path.display()),
        ))
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, PathBuf::from(file_name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

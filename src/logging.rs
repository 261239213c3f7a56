/// Structured logging for the AquaWatch service
///
/// Thin facade over `tracing`: every event carries the component that
/// produced it and, where there is one, the water body or row it concerns.
/// Supports compact console output for interactive use, timestamped
/// console output, and append-mode file logging for scheduled imports.

use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Store,
    Import,
    Export,
    Config,
    Dev,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Store => write!(f, "DB"),
            Component::Import => write!(f, "IMPORT"),
            Component::Export => write!(f, "EXPORT"),
            Component::Config => write!(f, "CFG"),
            Component::Dev => write!(f, "DEV"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Bad input from an operator or workbook; the run carries on
    Expected,
    /// Database or I/O trouble that needs someone to look at it
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// With a `log_file`, events are appended there without ANSI colour;
/// otherwise they go to stderr. Calling this twice is harmless: the first
/// subscriber wins.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&Path>,
    console_timestamps: bool,
) -> std::io::Result<()> {
    let level = min_level.as_tracing();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None if console_timestamps => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, entity: Option<&str>, message: &str) {
    tracing::info!(component = %component, entity = entity.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(component: Component, entity: Option<&str>, message: &str) {
    tracing::warn!(component = %component, entity = entity.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(component: Component, entity: Option<&str>, message: &str) {
    tracing::error!(component = %component, entity = entity.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(component: Component, entity: Option<&str>, message: &str) {
    tracing::debug!(component = %component, entity = entity.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

pub fn classify_store_failure(err: &StoreError) -> FailureType {
    match err {
        StoreError::Validation(_)
        | StoreError::DuplicateName(_)
        | StoreError::WaterBodyNotFound(_) => FailureType::Expected,
        StoreError::Database(_) => FailureType::Unexpected,
    }
}

/// Log a store failure with automatic classification.
///
/// Expected failures are warnings (the caller skips and continues);
/// unexpected ones are errors.
pub fn log_store_failure(entity: &str, operation: &str, err: &StoreError) {
    let failure_type = classify_store_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Component::Store, Some(entity), &message),
        FailureType::Unexpected => error(Component::Store, Some(entity), &message),
    }
}

// ---------------------------------------------------------------------------
// Import Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a bulk import run
pub fn log_import_summary(total: usize, created: usize, skipped: usize, with_alerts: usize) {
    let message = format!(
        "Import complete: {}/{} measurements loaded, {} skipped, {} with EPA alerts",
        created, total, skipped, with_alerts
    );

    if skipped == 0 {
        info(Component::Import, None, &message);
    } else if created == 0 && total > 0 {
        error(Component::Import, None, &message);
    } else {
        warn(Component::Import, None, &message);
    }
}

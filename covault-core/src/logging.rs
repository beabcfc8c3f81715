//! Security-aware logging infrastructure for the CoVault workflow
//!
//! Structured logging with security considerations:
//! - Never logs private keys or signature material
//! - Sanitizes potentially sensitive values (addresses, transaction IDs)
//! - Categorizes log events by workflow context
//!
//! # Usage
//!
//! ```
//! use covault_core::logging::{self, LogConfig, LogLevel};
//! use serde_json::json;
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//!
//! logging::log_transaction(
//!     LogLevel::Info,
//!     "draft_built",
//!     Some(json!({"inputs": 1, "outputs": 2})),
//! );
//! ```

use chrono::Local;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::io::Write as IoWrite;
use std::sync::Once;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Error conditions
    Error,
    /// Warning conditions
    Warn,
    /// Informational messages
    Info,
    /// Debug-level messages
    Debug,
    /// Trace level (very verbose)
    Trace,
}

/// Log context categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogContext {
    /// Script registration, key validation, completeness checks
    Security,
    /// Coin selection and reservation bookkeeping
    Core,
    /// Draft creation, signing, broadcasting
    Transaction,
    /// Out-of-band draft/address exchange
    Exchange,
}

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level for all contexts
    pub level: LogLevel,
    /// Whether to include timestamps in log messages
    pub include_timestamps: bool,
    /// Whether to log to console
    pub console_logging: bool,
    /// Whether to use JSON format for logs (machine-readable)
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_timestamps: true,
            console_logging: true,
            json_format: false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

// Ensure logging is only initialized once
static LOGGING_INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call configures the logger
/// and subsequent calls return Ok.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let include_timestamps = config.include_timestamps;
    let json_format = config.json_format;
    let console_logging = config.console_logging;
    let level = config.level;

    LOGGING_INIT.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.filter_level(level.into());
        if !console_logging {
            builder.filter_level(LevelFilter::Off);
        }

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            if json_format {
                let json = serde_json::json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", json)
            } else {
                if include_timestamps {
                    write!(buf, "{} ", timestamp)?;
                }
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
        });

        // Ignore double-initialization; common when tests share a process.
        let _ = builder.try_init();
    });

    Ok(())
}

/// Update the log level dynamically
pub fn set_log_level(level: LogLevel) {
    log::set_max_level(level.into());
}

/// Sanitize a potentially sensitive string for logging
///
/// Truncates the middle part of strings that might identify coins or
/// counterparties; full values never reach the log.
pub fn sanitize_for_logging(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let len = input.len();
    if len <= 8 {
        return "*****".to_string();
    }

    let first = &input[0..4];
    let last = &input[len - 4..len];
    format!("{}...{}", first, last)
}

fn log_with_context(
    level: LogLevel,
    context: LogContext,
    message: &str,
    params: Option<serde_json::Value>,
) {
    let level: log::Level = level.into();
    match params {
        Some(params) => log::log!(level, "[{:?}] {} {}", context, message, params),
        None => log::log!(level, "[{:?}] {}", context, message),
    }
}

/// Log a security-related event
pub fn log_security(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Security, message, params);
}

/// Log a coin selection / reservation event
pub fn log_core(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Core, message, params);
}

/// Log a transaction lifecycle event
pub fn log_transaction(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Transaction, message, params);
}

/// Log an out-of-band exchange event
pub fn log_exchange(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Exchange, message, params);
}

/// Build a JSON parameter map from (name, value) pairs
pub fn log_params(params: Vec<(&str, String)>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in params {
        map.insert(name.to_string(), serde_json::Value::String(value));
    }
    serde_json::Value::Object(map)
}

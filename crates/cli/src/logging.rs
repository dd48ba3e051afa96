//! Logging setup for the command line tool

use anyhow::{anyhow, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays
/// clean for tables and JSON
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| anyhow!("Invalid log level: {}", level))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::debug!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new(Level::TRACE).with_json().with_file_info();
        assert_eq!(config.level, Level::TRACE);
        assert!(config.json && config.file_info);
        assert!(!config.log_spans);
    }
}

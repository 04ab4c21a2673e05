//! Runtime configuration.
//!
//! Defaults are overridden by environment variables (a `.env` file is loaded
//! by the binary before this runs):
//!
//! - `RECORD_LOADER_DB`: database file path
//! - `RECORD_LOADER_CHUNK_SIZE`: records per insert call during import
//! - `RECORD_LOADER_DELIMITER`: single ASCII field delimiter
//! - `RECORD_LOADER_LOG_LEVEL`: trace, debug, info, warn, error
//! - `RECORD_LOADER_LOG_FORMAT`: text, json
//! - `RECORD_LOADER_LOG_FILTER`: extra `tracing` filter directives

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::logging::LogConfig;
use crate::streaming::{DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITER};

pub const ENV_DB: &str = "RECORD_LOADER_DB";
pub const ENV_CHUNK_SIZE: &str = "RECORD_LOADER_CHUNK_SIZE";
pub const ENV_DELIMITER: &str = "RECORD_LOADER_DELIMITER";
pub const ENV_LOG_LEVEL: &str = "RECORD_LOADER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "RECORD_LOADER_LOG_FORMAT";
pub const ENV_LOG_FILTER: &str = "RECORD_LOADER_LOG_FILTER";

/// Database file name inside the data directory.
const DB_FILE_NAME: &str = "records.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub chunk_size: usize,
    pub delimiter: u8,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter: DEFAULT_DELIMITER,
            log: LogConfig::default(),
        }
    }
}

/// `<data dir>/record-loader/records.db`, or the working directory when the
/// platform has no data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("record-loader"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DB_FILE_NAME)
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for unparsable or out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB).filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(size) = lookup(ENV_CHUNK_SIZE) {
            config.chunk_size = size.trim().parse().map_err(|_| {
                AppError::Config(format!("{} must be a positive integer, got {:?}", ENV_CHUNK_SIZE, size))
            })?;
        }

        if let Some(delimiter) = lookup(ENV_DELIMITER) {
            config.delimiter = parse_delimiter(&delimiter)?;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log.level = level.parse()?;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log.format = format.parse()?;
        }

        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            config.log.filter_directives = Some(filter);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("Chunk size must be at least 1".into()));
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'\n' | b'\r') {
            return Err(AppError::Config(format!(
                "Delimiter must be a single ASCII character other than a line break, got byte {}",
                self.delimiter
            )));
        }
        Ok(())
    }
}

/// Parses a delimiter given as one ASCII character, or `\t` / `tab`.
pub fn parse_delimiter(raw: &str) -> Result<u8, AppError> {
    match raw {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }

    match raw.as_bytes() {
        [b] if b.is_ascii() && !matches!(b, b'\n' | b'\r') => Ok(*b),
        _ => Err(AppError::Config(format!(
            "Delimiter must be a single ASCII character, got {:?}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.log.level, LogLevel::Info);
        assert!(config.db_path.ends_with("records.db"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_DB, "/tmp/test-records.db"),
            (ENV_CHUNK_SIZE, " 1000 "),
            (ENV_DELIMITER, "|"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_LOG_FILTER, "rusqlite=warn"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/test-records.db"));
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.delimiter, b'|');
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter_directives.as_deref(), Some("rusqlite=warn"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_CHUNK_SIZE, "0")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn non_numeric_chunk_size_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_CHUNK_SIZE, "many")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("§").is_err());
        assert!(parse_delimiter("\n").is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "verbose")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}

//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration lookups.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Errors raised while reading or querying configuration files.
///
/// Every variant is recoverable: callers such as `ape check` report it
/// and carry on instead of crashing.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A configuration file could not be opened or read.
    #[error("Unable to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid INI.
    #[error("Unable to parse '{path}' (line {line}): {message}")]
    Parse { path: PathBuf, line: usize, message: String },

    /// A required section does not exist.
    #[error("Missing section [{0}]")]
    MissingSection(String),

    /// A required option does not exist.
    #[error("Missing option '{option}' in section [{section}]")]
    MissingOption { section: String, option: String },

    /// An option exists but cannot be coerced to the requested type.
    #[error("Option '{option}' in section [{section}] is '{value}', expected {expected}")]
    InvalidValue { section: String, option: String, value: String, expected: &'static str },

    /// The `config_glob` pattern is malformed.
    #[error("Invalid config_glob '{pattern}': {message}")]
    Glob { pattern: String, message: String },

    /// A composite section ends up including itself.
    #[error("Section [{section}] includes itself")]
    Cycle { section: String },
}

impl ConfigurationError {
    /// Build an `InvalidValue` error.
    pub(crate) fn invalid(
        section: &str,
        option: &str,
        value: &str,
        expected: &'static str,
    ) -> Self {
        Self::InvalidValue {
            section: section.to_string(),
            option: option.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

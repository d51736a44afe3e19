//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading settings or the server document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the file that couldn't be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML settings file.
    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the file that couldn't be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// Failed to parse the JSON server configuration.
    #[error("Failed to parse server config {path}: {source}")]
    ServerParseError {
        /// Path to the server configuration.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A required value was not provided by any layer.
    #[error("Missing config value {field}: {hint}")]
    MissingValue {
        /// The field that is unset.
        field: String,
        /// How to provide it.
        hint: String,
    },

    /// A configuration value is invalid.
    #[error("Invalid config value for {field}: {message}")]
    InvalidValue {
        /// The field name that has an invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// The client binary could not be located.
    #[error("Client binary '{binary}' not found: {message}")]
    BinaryNotFound {
        /// Binary name or path as configured.
        binary: String,
        /// Lookup failure.
        message: String,
    },
}

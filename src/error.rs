//! Error types for the telemetry engine

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the telemetry engine
///
/// Only malformed requests and configuration problems surface through this
/// type. Backend failures are contained at the adapter and catalog boundaries
/// and degrade to empty results.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested range ends before it starts
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidRange {
        /// First requested day
        start: NaiveDate,
        /// Last requested day
        end: NaiveDate,
    },

    /// A date string could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Processing mode name is not recognised
    #[error("Unknown processing mode: {0}")]
    UnknownMode(String),

    /// Backend name is not recognised
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by a physical reading store
///
/// Adapters never let these cross their boundary: a failed fetch is logged
/// and turned into an empty reading sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The store rejected or failed the query
    #[error("Query failed: {0}")]
    Query(String),

    /// The query did not complete in time
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Validation errors
///
/// Raised while checking configuration values.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Configuration(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

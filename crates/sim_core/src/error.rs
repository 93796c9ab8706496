//! Crate-wide error types for the boundaries that can fail before the event
//! loop starts: configuration loading and input parsing.
//!
//! Invariant violations inside the loop are not represented here — those are
//! programming errors and fail fast via `panic!`/`assert!` per the
//! propagation policy (config/input errors are recoverable-before-start,
//! invariant violations are not).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("inconsistent config: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InputResult<T> = Result<T, InputError>;

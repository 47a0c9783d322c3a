use thiserror::Error;

use crate::types::SensorKind;

/// Tracker error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Malformed {sensor} measurement: expected {expected} values, got {actual}")]
    MalformedMeasurement {
        sensor: SensorKind,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in {sensor} measurement")]
    NonFiniteMeasurement { sensor: SensorKind },

    #[error("Filter diverged: augmented covariance is not positive definite")]
    Divergence,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Io(err.to_string())
    }
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

//! Error types for HSES scoring

use thiserror::Error;

/// Errors that can occur while scoring telemetry
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Failed to parse score request: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid time of day {0:?}: expected HH:MM (24-hour)")]
    InvalidTimeOfDay(String),

    #[error("Invalid session length {0}: expected a non-negative number of minutes")]
    InvalidSessionLength(f64),

    #[error("Invalid value for signal {signal}: {value} is not a finite number")]
    InvalidSignalValue { signal: String, value: f64 },

    #[error("Unknown signal in configuration: {0}")]
    UnknownSignal(String),

    #[error("Invalid bounds for {signal}: min {min} is greater than max {max}")]
    InvalidBounds { signal: String, min: f64, max: f64 },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

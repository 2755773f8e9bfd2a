//! Construction-time errors.
//!
//! The processing path itself is infallible: once an engine exists, every
//! setter clamps and `process` always produces audio. The only thing that can
//! go wrong is building an engine from a nonsensical configuration.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("record capacity must be between 1 and 600 seconds, got {0}")]
    InvalidRecordCapacity(f32),
}

//! # Error Types
//!
//! Custom error types for MSP Link using `thiserror`.
//!
//! Framing and checksum failures on the inbound stream are deliberately absent:
//! the decoder absorbs them by resynchronizing.

use thiserror::Error;

/// Main error type for MSP Link
#[derive(Debug, Error)]
pub enum LinkError {
    /// MSP protocol errors (outbound frame construction, record sizes)
    #[error("MSP protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// A background loop panicked or was aborted
    #[error("Link task failed: {0}")]
    Task(String),
}

/// Result type alias for MSP Link
pub type Result<T> = std::result::Result<T, LinkError>;

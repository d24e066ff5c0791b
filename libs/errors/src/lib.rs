//! Unified error handling for VoltageEMS meter services
//!
//! Frame-level anomalies never reach this type: the protocol layer reports them
//! as decode outcomes and the stream keeps running. `VoltageError` covers the
//! service shell around it (startup, configuration, serial port, record files).

use thiserror::Error;

// ============================================================================
// VoltageError - Main error type
// ============================================================================

/// Main error type for the meter services
#[derive(Debug, Error)]
pub enum VoltageError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Communication Errors
    // ======================================
    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Serial port error: {port}: {reason}")]
    SerialPort { port: String, reason: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record file error: {path}: {reason}")]
    RecordFile { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ======================================
    // Service Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),
}

/// Result type alias using VoltageError
pub type VoltageResult<T> = Result<T, VoltageError>;

impl From<csv::Error> for VoltageError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(format!("CSV error: {}", err))
    }
}

impl VoltageError {
    /// Stable error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Communication(_) => "COMMUNICATION_ERROR",
            Self::SerialPort { .. } => "SERIAL_PORT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::RecordFile { .. } => "RECORD_FILE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::StartupFailed(_) => "STARTUP_FAILED",
        }
    }
}

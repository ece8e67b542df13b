//! Unified error handling for the relay services
//!
//! Every crate in the workspace reports failures through [`RelayError`].
//! Configuration problems are grouped under [`ConfigError`] so callers of
//! `configure`/`refresh` can match on the exact cause.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorInfo - transport error payload
// ============================================================================

/// Error payload handed to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (HTTP-like status)
    pub code: u16,
    /// Stable machine readable identifier
    pub error_code: String,
    /// Error message
    pub message: String,
}

// ============================================================================
// ConfigError - fatal to configure/refresh
// ============================================================================

/// Errors raised while (re)building the point table
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no point found")]
    EmptyTable,

    #[error("cannot find points array")]
    MissingPoints,

    #[error("cannot access GPIO chip: {0}")]
    ChipUnavailable(String),

    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("cannot load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// RelayError - Main error type
// ============================================================================

/// Main error type for the relay services
#[derive(Debug, Error)]
pub enum RelayError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ======================================
    // Caller Errors
    // ======================================
    #[error("invalid point name: {0}")]
    UnknownPoint(String),

    #[error("invalid state value: {0}")]
    InvalidState(String),

    #[error("invalid pulse value: {0}")]
    InvalidPulse(i32),

    // ======================================
    // Hardware & Runtime Errors
    // ======================================
    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias using RelayError
pub type RelayResult<T> = Result<T, RelayError>;

/// Error category enum - used for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    NotFound,
    Hardware,
    Internal,
}

impl RelayError {
    /// Stable error code for logs and transport payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::EmptyTable) => "EMPTY_TABLE",
            Self::Config(ConfigError::MissingPoints) => "MISSING_POINTS",
            Self::Config(ConfigError::ChipUnavailable(_)) => "CHIP_UNAVAILABLE",
            Self::Config(ConfigError::Invalid { .. }) => "INVALID_CONFIG",
            Self::Config(ConfigError::Load(_)) => "CONFIG_LOAD_FAILED",
            Self::UnknownPoint(_) => "UNKNOWN_POINT",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InvalidPulse(_) => "INVALID_PULSE",
            Self::Hardware(_) => "HARDWARE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Runtime(_) => "RUNTIME_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::UnknownPoint(_) => ErrorCategory::NotFound,
            Self::InvalidState(_) | Self::InvalidPulse(_) => ErrorCategory::Validation,
            Self::Hardware(_) | Self::Io(_) => ErrorCategory::Hardware,
            Self::Serialization(_) | Self::Runtime(_) => ErrorCategory::Internal,
        }
    }

    /// Caller errors are rejected before any side effect takes place
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::NotFound
        )
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Hardware => 503,
            ErrorCategory::Configuration | ErrorCategory::Internal => 500,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.status_code(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

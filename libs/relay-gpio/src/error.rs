//! Error types for relay-gpio

use errors::RelayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO chip {0} not available")]
    ChipUnavailable(String),

    #[error("GPIO line {offset} unavailable: {reason}")]
    LineUnavailable { offset: u32, reason: String },

    #[error("GPIO line {0} busy")]
    LineBusy(u32),

    #[error("GPIO line {offset} I/O error: {source}")]
    Io {
        offset: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO line {offset} access failed: {reason}")]
    Access { offset: u32, reason: String },
}

impl GpioError {
    pub fn io(offset: u32, source: std::io::Error) -> Self {
        Self::Io { offset, source }
    }
}

impl From<GpioError> for RelayError {
    fn from(err: GpioError) -> Self {
        RelayError::Hardware(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GpioError>;

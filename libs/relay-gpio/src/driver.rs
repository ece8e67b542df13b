//! GPIO line capability
//!
//! The relay engine only ever talks to hardware through these three traits:
//! - `GpioDriver` opens a chip by number
//! - `GpioChip` hands out exclusive line handles
//! - `GpioLine` reads and writes raw electrical levels
//!
//! A line is released when its handle is dropped. Line handles must be
//! dropped before the chip that produced them.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mock::MockGpioDriver;
use crate::sysfs::SysfsGpioDriver;

/// Output drive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    PushPull,
    OpenDrain,
}

/// Requested line direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    Input,
    /// `initial` is the raw level driven as soon as the line is acquired
    Output { drive: Drive, initial: bool },
}

/// Line request passed to [`GpioChip::request_line`]
#[derive(Debug, Clone)]
pub struct LineRequest {
    pub offset: u32,
    pub consumer: String,
    pub direction: LineDirection,
}

impl LineRequest {
    pub fn input(offset: u32, consumer: impl Into<String>) -> Self {
        Self {
            offset,
            consumer: consumer.into(),
            direction: LineDirection::Input,
        }
    }

    pub fn output(offset: u32, consumer: impl Into<String>, drive: Drive, initial: bool) -> Self {
        Self {
            offset,
            consumer: consumer.into(),
            direction: LineDirection::Output { drive, initial },
        }
    }
}

/// GPIO driver trait for abstraction
pub trait GpioDriver: Send + Sync {
    /// Open a GPIO chip by its index
    fn open_chip(&self, chip: u32) -> Result<Box<dyn GpioChip>>;

    /// Check if driver is available
    fn is_available(&self) -> bool;

    /// Backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// An opened GPIO controller
pub trait GpioChip: Send {
    fn label(&self) -> &str;

    /// Acquire exclusive access to one line
    fn request_line(&mut self, request: &LineRequest) -> Result<Box<dyn GpioLine>>;
}

/// One acquired line, released on drop
pub trait GpioLine: Send {
    fn offset(&self) -> u32;

    /// Read the raw level
    fn get_value(&mut self) -> Result<bool>;

    /// Drive the raw level
    fn set_value(&mut self, high: bool) -> Result<()>;
}

fn default_base_path() -> String {
    "/sys/class/gpio".to_string()
}

/// GPIO backend type, selected from configuration at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum GpioBackend {
    /// Linux sysfs GPIO interface
    Sysfs {
        #[serde(default = "default_base_path")]
        base_path: String,
    },
    /// In-memory lines, for simulation and tests
    Mock,
}

impl Default for GpioBackend {
    fn default() -> Self {
        Self::Sysfs {
            base_path: default_base_path(),
        }
    }
}

/// Create the driver for a configured backend
pub fn create_driver(backend: &GpioBackend) -> Box<dyn GpioDriver> {
    match backend {
        GpioBackend::Sysfs { base_path } => Box::new(SysfsGpioDriver::new(base_path)),
        GpioBackend::Mock => Box::new(MockGpioDriver::new()),
    }
}

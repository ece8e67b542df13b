//! GPIO line access for the relay services
//!
//! Provides the hardware capability the relay engine is built on.
//!
//! # Backends
//!
//! - `sysfs` - Linux `/sys/class/gpio` interface
//! - `mock` - in-memory lines for simulation and testing
//!
//! Both implement the same `GpioDriver` / `GpioChip` / `GpioLine` traits;
//! the backend is picked at runtime from configuration with
//! [`create_driver`].

pub mod driver;
pub mod error;
pub mod mock;
pub mod sysfs;

pub use driver::{
    create_driver, Drive, GpioBackend, GpioChip, GpioDriver, GpioLine, LineDirection, LineRequest,
};
pub use error::GpioError;
pub use mock::{MockGpioDriver, MockGpioHandle};
pub use sysfs::SysfsGpioDriver;

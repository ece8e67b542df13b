//! Shared service plumbing for the relay services
//!
//! - logging bootstrap (`tracing` subscriber, bracketed console format,
//!   optional daily rolling file)
//! - graceful shutdown signal handling
//! - time providers (system clock, manual clock for tests)
//! - common command-line arguments

pub mod bootstrap_args;
pub mod logging;
pub mod shutdown;
pub mod time;

pub use bootstrap_args::ServiceArgs;
pub use logging::{init_logging, LoggingConfig};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};

// Re-export common dependencies
pub use anyhow;
pub use tokio;

//! Relay Service (`relaysrv`)
//!
//! Exposes relay outputs and digital inputs wired to GPIO lines through a
//! small state-tracking engine:
//!
//! - a point table built from configuration and bound to hardware lines
//! - timed pulses that revert on their own
//! - an on-demand sample ring answering "what changed since T"
//! - status snapshots, command history and operator events
//!
//! The HTTP transport is not part of this crate; [`engine::RelayEngine`]
//! exposes plain status and command operations for one.

pub mod config;
pub mod engine;
pub mod events;
pub mod history;
pub mod points;
pub mod pulse;
pub mod report;
pub mod runtime;
pub mod sampling;

pub use config::{ConfigFile, GpioTableConfig, PointSource, RelaysConfig};
pub use engine::{parse_state, EngineSettings, RelayEngine, ALL_POINTS};
pub use events::{Event, EventSink, MemoryEventSink, TracingEventSink};
pub use history::{CommandHistory, CommandRecord};
pub use points::{Point, PointMode, PointSpec, PointTable};
pub use report::{ChangeReport, PointSamples, PointStatus, StatusReport};
pub use runtime::{spawn_ticks, SharedEngine, TickHandles};

// Re-export error types
pub use errors::{ConfigError, RelayError, RelayResult};

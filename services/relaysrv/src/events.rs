//! Operator-visible events
//!
//! Every command, pulse end and input edge produces one [`Event`]. The
//! engine hands them to an [`EventSink`]; the default sink turns them into
//! `info!` records on target `relaysrv::event`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

pub const CATEGORY_GPIO: &str = "GPIO";
pub const DETAIL_LATCHED: &str = "LATCHED";
pub const DETAIL_END_OF_PULSE: &str = "END OF PULSE";
pub const DETAIL_CHANGED: &str = "CHANGED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Unix seconds
    pub timestamp: i64,
    pub category: String,
    pub subject: String,
    pub verb: String,
    pub detail: String,
}

impl Event {
    pub fn gpio(
        timestamp: i64,
        subject: impl Into<String>,
        verb: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            category: CATEGORY_GPIO.to_string(),
            subject: subject.into(),
            verb: verb.into(),
            detail: detail.into(),
        }
    }

    /// Detail for a timed command
    pub fn pulse_detail(seconds: i32) -> String {
        format!("FOR {} SECONDS", seconds)
    }
}

/// Receives engine events
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Emits events as structured log records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: Event) {
        info!(
            target: "relaysrv::event",
            category = %event.category,
            subject = %event.subject,
            timestamp = event.timestamp,
            "{} {} {}",
            event.subject,
            event.verb,
            event.detail
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events whose detail matches exactly
    pub fn with_detail(&self, detail: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.detail == detail)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

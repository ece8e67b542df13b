//! Status and change reports
//!
//! Pure projections of engine state, shaped for a JSON transport.

use serde::Serialize;

use crate::points::{PointMode, PointTable};
use crate::sampling::RingWindow;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Current state of one point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointStatus {
    pub name: String,
    pub mode: PointMode,
    /// Last observed logical state
    pub state: bool,
    /// Commanded state, outputs only, omitted when equal to `state`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<bool>,
    /// Absolute pulse deadline (Unix seconds) while pulsing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub failed: bool,
}

/// Full-state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Unix seconds
    pub timestamp: i64,
    pub points: Vec<PointStatus>,
}

impl StatusReport {
    pub fn point(&self, name: &str) -> Option<&PointStatus> {
        self.points.iter().find(|p| p.name == name)
    }
}

/// Samples of one input point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointSamples {
    pub name: String,
    pub samples: Vec<bool>,
}

/// Sample history answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    /// Timestamp (ms) of the first sample in the report
    pub start: i64,
    pub quantum_ms: u64,
    /// Offset (ms) of the last sample from `start`
    pub end: i64,
    /// Whole retained ring rather than changes since the requested time
    pub full: bool,
    pub points: Vec<PointSamples>,
}

impl ChangeReport {
    pub fn point(&self, name: &str) -> Option<&PointSamples> {
        self.points.iter().find(|p| p.name == name)
    }
}

/// Snapshot every point in the table, bound or not
pub fn status(table: &PointTable, now: i64) -> StatusReport {
    let points = table
        .iter()
        .map(|point| {
            let spec = point.spec();
            let command = (point.is_output() && point.commanded() != point.observed())
                .then_some(point.commanded());
            let pulse = point.pulse();
            PointStatus {
                name: spec.name.clone(),
                mode: spec.mode,
                state: point.observed(),
                command,
                pulse: pulse.is_pulsing().then(|| pulse.deadline()),
                gear: spec.gear.clone(),
                description: spec.description.clone(),
                failed: point.is_failed(),
            }
        })
        .collect();

    StatusReport {
        timestamp: now,
        points,
    }
}

/// Name the runs of a ring window; `sampled[i]` is the table index of ring point `i`
pub fn changes(
    table: &PointTable,
    sampled: &[usize],
    window: RingWindow,
    quantum_ms: u64,
) -> ChangeReport {
    let points = window
        .runs
        .into_iter()
        .filter_map(|(position, samples)| {
            let idx = *sampled.get(position)?;
            let point = table.get(idx)?;
            Some(PointSamples {
                name: point.name().to_string(),
                samples,
            })
        })
        .collect();

    ChangeReport {
        start: window.start,
        quantum_ms,
        end: window.end,
        full: window.full,
        points,
    }
}

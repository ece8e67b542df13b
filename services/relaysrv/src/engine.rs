//! Relay/input point engine
//!
//! Owns the point table (and through it every hardware line), the sample
//! ring and the command history. All operations run on one logical thread;
//! the daemon shares the engine behind a mutex and drives it with two
//! periodic ticks:
//!
//! - [`RelayEngine::on_second_tick`] ends expired pulses, refreshes observed
//!   states and stops sampling once no client has asked for changes within
//!   the idle timeout
//! - [`RelayEngine::on_sample_tick`] writes one ring slot while sampling is
//!   enabled
//!
//! Hot-path operations never return errors: hardware failures are tracked
//! with each point's sticky `failed` flag.

use std::sync::Arc;

use common::time::{SystemTimeProvider, TimeProvider};
use errors::{ConfigError, RelayError, RelayResult};
use relay_gpio::GpioDriver;
use tracing::{debug, info, warn};

use crate::config::{GpioTableConfig, PointSource, RelaysConfig, SamplingConfig};
use crate::events::{
    Event, EventSink, TracingEventSink, DETAIL_CHANGED, DETAIL_END_OF_PULSE, DETAIL_LATCHED,
};
use crate::history::{CommandHistory, CommandRecord};
use crate::points::{Point, PointMode, PointTable};
use crate::pulse::PulseState;
use crate::report::{self, ChangeReport, StatusReport};
use crate::sampling::SampleRing;

/// Target addressing every point in [`RelayEngine::command`]
pub const ALL_POINTS: &str = "all";

/// Engine tuning, taken from the service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub sampling: SamplingConfig,
    pub history_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&RelaysConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &RelaysConfig) -> Self {
        Self {
            sampling: config.sampling.clone(),
            history_depth: config.history.depth,
        }
    }
}

/// Parse a state token: `on`/`1` or `off`/`0`
pub fn parse_state(token: &str) -> RelayResult<bool> {
    match token {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        _ => Err(RelayError::InvalidState(token.to_string())),
    }
}

fn state_name(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

pub struct RelayEngine {
    // Declared first so the lines are released before anything else drops
    table: PointTable,
    ring: SampleRing,
    /// Table indexes of the sampled input points, in ring order
    sampled: Vec<usize>,
    sampling: bool,
    last_query_ms: i64,
    history: CommandHistory,
    settings: EngineSettings,
    driver: Box<dyn GpioDriver>,
    source: Box<dyn PointSource>,
    clock: Arc<dyn TimeProvider>,
    events: Arc<dyn EventSink>,
}

impl RelayEngine {
    pub fn new(
        driver: Box<dyn GpioDriver>,
        source: Box<dyn PointSource>,
        settings: EngineSettings,
    ) -> Self {
        let ring = SampleRing::new(settings.sampling.depth, settings.sampling.quantum_ms, 0);
        Self {
            table: PointTable::default(),
            ring,
            sampled: Vec::new(),
            sampling: false,
            last_query_ms: 0,
            history: CommandHistory::new(settings.history_depth),
            settings,
            driver,
            source,
            clock: Arc::new(SystemTimeProvider),
            events: Arc::new(TracingEventSink),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> Arc<dyn TimeProvider> {
        Arc::clone(&self.clock)
    }

    pub fn table(&self) -> &PointTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    pub fn point(&self, idx: usize) -> Option<&Point> {
        self.table.get(idx)
    }

    /// Rebuild the table from scratch.
    ///
    /// Every line held so far is released first; on error the table is
    /// left empty.
    pub fn configure(&mut self, config: &GpioTableConfig) -> Result<(), ConfigError> {
        self.release();

        self.table = PointTable::bind(self.driver.as_ref(), config)?;

        let inputs: Vec<usize> = self
            .table
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mode() == PointMode::Input && p.is_bound())
            .map(|(idx, _)| idx)
            .collect();
        let max_points = self.settings.sampling.max_points;
        if inputs.len() > max_points {
            warn!(
                "{} input points, only the first {} are sampled",
                inputs.len(),
                max_points
            );
        }
        self.sampled = inputs.into_iter().take(max_points).collect();
        self.ring.set_points(self.sampled.len());

        info!(
            "Configured {} points ({} bound, {} sampled) on {} chip {}",
            self.table.len(),
            self.table.bound_count(),
            self.sampled.len(),
            self.driver.name(),
            self.table.chip_label().unwrap_or("?")
        );
        Ok(())
    }

    /// Re-read the point source and configure again.
    ///
    /// A source that cannot be read leaves the current table in place.
    pub fn refresh(&mut self) -> RelayResult<()> {
        debug!("Refreshing points from {}", self.source.describe());
        let config = self.source.load_table()?;
        self.configure(&config)?;
        Ok(())
    }

    /// Release every line and the chip. `configure` makes the engine usable again.
    pub fn teardown(&mut self) {
        let points = self.table.len();
        self.release();
        info!("Released {} points", points);
    }

    fn release(&mut self) {
        self.table.release();
        self.sampled.clear();
        self.ring.set_points(0);
        self.sampling = false;
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.table.lookup(name)
    }

    /// Command an output point.
    ///
    /// Returns false only for an index outside the table. Input and unbound
    /// points are ignored and still report success.
    pub fn set(&mut self, idx: usize, state: bool, pulse: i32, cause: Option<&str>) -> bool {
        let Some(point) = self.table.get(idx) else {
            return false;
        };
        if !point.is_output() || !point.is_bound() {
            debug!("{}: set ignored ({} point)", point.name(), point.mode().as_str());
            return true;
        }

        let now = self.clock.now_secs();
        if let Some(name) = self.drive(idx, state, pulse, cause, now) {
            let detail = if pulse > 0 {
                Event::pulse_detail(pulse)
            } else {
                DETAIL_LATCHED.to_string()
            };
            self.events
                .record(Event::gpio(now, name, state_name(state), detail));
        }
        true
    }

    /// Drive the line and record the command; returns the point name
    fn drive(
        &mut self,
        idx: usize,
        state: bool,
        pulse: i32,
        cause: Option<&str>,
        now: i64,
    ) -> Option<String> {
        let point = self.table.get_mut(idx)?;

        point.write(state);
        point.commanded = state;
        point.pulse = PulseState::schedule(now, pulse);
        if let Some(observed) = point.read() {
            point.observed = observed;
        }

        let name = point.name().to_string();
        if pulse > 0 {
            debug!("set {} to {} at {} (pulse {}s)", name, state_name(state), now, pulse);
        } else {
            debug!("set {} to {} at {}", name, state_name(state), now);
        }

        self.history.push(CommandRecord {
            timestamp: now,
            point: name.clone(),
            command: state_name(state).to_string(),
            pulse: pulse.max(0),
            cause: cause.map(str::to_string),
        });
        Some(name)
    }

    /// Read a point's logical state from the hardware.
    ///
    /// Falls back to the last observed state when the line cannot be read;
    /// false for an index outside the table.
    pub fn get(&mut self, idx: usize) -> bool {
        let now = self.clock.now_secs();
        self.observe(idx, now)
    }

    /// Refresh the observed state; an input edge emits a CHANGED event
    fn observe(&mut self, idx: usize, now: i64) -> bool {
        let Some(point) = self.table.get_mut(idx) else {
            return false;
        };
        let Some(value) = point.read() else {
            return point.observed;
        };
        if value != point.observed {
            point.observed = value;
            if !point.is_output() {
                self.events.record(Event::gpio(
                    now,
                    point.name(),
                    state_name(value),
                    DETAIL_CHANGED,
                ));
            }
        }
        value
    }

    /// Full-state snapshot
    pub fn snapshot(&self) -> StatusReport {
        report::status(&self.table, self.clock.now_secs())
    }

    /// Input samples since `since_ms`.
    ///
    /// Re-arms the idle timer. If sampling was stopped it restarts with an
    /// empty ring plus one immediate sample, so the answer is a full report.
    pub fn changes_since(&mut self, since_ms: i64) -> ChangeReport {
        let now_ms = self.clock.now_millis();
        self.last_query_ms = now_ms;

        if !self.sampling {
            self.sampling = true;
            self.ring.reset();
            info!(
                "Sampling started ({} points every {} ms)",
                self.sampled.len(),
                self.ring.quantum_ms()
            );
            self.sample(now_ms);
        }

        let window = self.ring.window(since_ms);
        report::changes(&self.table, &self.sampled, window, self.ring.quantum_ms())
    }

    /// Once per second: end pulses, refresh observed states, gate sampling
    pub fn on_second_tick(&mut self, now: i64) {
        let due: Vec<usize> = self
            .table
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_output() && p.pulse().is_due(now))
            .map(|(idx, _)| idx)
            .collect();

        for idx in due {
            let Some(state) = self.table.get(idx).map(|p| !p.commanded()) else {
                continue;
            };
            if let Some(name) = self.drive(idx, state, 0, None, now) {
                self.events.record(Event::gpio(
                    now,
                    name,
                    state_name(state),
                    DETAIL_END_OF_PULSE,
                ));
            }
        }

        for idx in 0..self.table.len() {
            self.observe(idx, now);
        }

        let idle_ms = self.settings.sampling.idle_timeout_secs as i64 * 1000;
        if self.sampling && now.saturating_mul(1000) - self.last_query_ms >= idle_ms {
            self.sampling = false;
            self.ring.reset();
            info!(
                "Sampling stopped after {}s without change queries",
                self.settings.sampling.idle_timeout_secs
            );
        }
    }

    /// Write one ring slot; no-op while sampling is stopped
    pub fn on_sample_tick(&mut self, now_ms: i64) {
        if self.sampling {
            self.sample(now_ms);
        }
    }

    fn sample(&mut self, now_ms: i64) {
        let now = now_ms.div_euclid(1000);
        let mut values = Vec::with_capacity(self.sampled.len());
        for i in 0..self.sampled.len() {
            let idx = self.sampled[i];
            values.push(self.observe(idx, now));
        }
        self.ring.advance(now_ms, &values);
    }

    /// Command points by name, or every point with `"all"`.
    ///
    /// Validates everything before touching any point. Returns the number
    /// of points addressed.
    pub fn command(
        &mut self,
        target: &str,
        state_token: &str,
        pulse: i32,
        cause: Option<&str>,
    ) -> RelayResult<usize> {
        let state = parse_state(state_token)?;
        if pulse < 0 {
            return Err(RelayError::InvalidPulse(pulse));
        }

        let targets: Vec<usize> = if target == ALL_POINTS {
            (0..self.table.len()).collect()
        } else {
            self.table.lookup(target).into_iter().collect()
        };
        if targets.is_empty() {
            return Err(RelayError::UnknownPoint(target.to_string()));
        }

        for &idx in &targets {
            self.set(idx, state, pulse, cause);
        }
        Ok(targets.len())
    }

    /// Executed commands, oldest first
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }
}

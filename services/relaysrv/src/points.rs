//! Point table and hardware binding
//!
//! The table owns the opened chip and every acquired line. It is rebuilt
//! as a whole on each configure: [`PointTable::release`] drops all lines,
//! then the chip, before anything new is requested.

use std::fmt;

use ahash::AHashMap;
use errors::ConfigError;
use relay_gpio::{Drive, GpioChip, GpioDriver, GpioError, GpioLine, LineRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::GpioTableConfig;
use crate::pulse::PulseState;

/// Point direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointMode {
    #[default]
    Output,
    Input,
}

impl PointMode {
    /// Case-insensitive; anything but "input" is an output
    pub fn parse(mode: Option<&str>) -> Self {
        match mode {
            Some(m) if m.trim().eq_ignore_ascii_case("input") => Self::Input,
            _ => Self::Output,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Input => "input",
        }
    }
}

/// Declarative description of one point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSpec {
    pub name: String,
    /// Line offset on the configured chip
    pub line: u32,
    /// Raw level meaning logical "on"
    pub active_high: bool,
    #[serde(default)]
    pub mode: PointMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PointSpec {
    pub fn output(name: impl Into<String>, line: u32, active_high: bool) -> Self {
        Self {
            name: name.into(),
            line,
            active_high,
            mode: PointMode::Output,
            gear: None,
            description: None,
        }
    }

    pub fn input(name: impl Into<String>, line: u32, active_high: bool) -> Self {
        Self {
            mode: PointMode::Input,
            ..Self::output(name, line, active_high)
        }
    }

    fn line_request(&self) -> LineRequest {
        match self.mode {
            PointMode::Input => LineRequest::input(self.line, self.name.as_str()),
            // Active-low relays are wired open drain; outputs start at the off level
            PointMode::Output => {
                let drive = if self.active_high {
                    Drive::PushPull
                } else {
                    Drive::OpenDrain
                };
                LineRequest::output(self.line, self.name.as_str(), drive, !self.active_high)
            },
        }
    }
}

/// One live point
pub struct Point {
    spec: PointSpec,
    line: Option<Box<dyn GpioLine>>,
    pub(crate) commanded: bool,
    pub(crate) pulse: PulseState,
    pub(crate) observed: bool,
    failed: bool,
}

impl Point {
    fn new(spec: PointSpec) -> Self {
        Self {
            spec,
            line: None,
            commanded: false,
            pulse: PulseState::Latched,
            observed: false,
            failed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &PointSpec {
        &self.spec
    }

    pub fn mode(&self) -> PointMode {
        self.spec.mode
    }

    pub fn is_output(&self) -> bool {
        self.spec.mode == PointMode::Output
    }

    pub fn is_bound(&self) -> bool {
        self.line.is_some()
    }

    /// Last hardware access (or the binding) failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn commanded(&self) -> bool {
        self.commanded
    }

    pub fn pulse(&self) -> PulseState {
        self.pulse
    }

    pub fn observed(&self) -> bool {
        self.observed
    }

    /// Drive the raw level for a logical state
    pub(crate) fn write(&mut self, state: bool) -> bool {
        let raw = state == self.spec.active_high;
        let Some(line) = self.line.as_mut() else {
            return false;
        };
        match line.set_value(raw) {
            Ok(()) => {
                self.recovered();
                true
            },
            Err(e) => {
                self.access_failed("write", &e);
                false
            },
        }
    }

    /// Read the logical state from the line
    pub(crate) fn read(&mut self) -> Option<bool> {
        let on = self.spec.active_high;
        let line = self.line.as_mut()?;
        match line.get_value() {
            Ok(raw) => {
                self.recovered();
                Some(raw == on)
            },
            Err(e) => {
                self.access_failed("read", &e);
                None
            },
        }
    }

    fn access_failed(&mut self, op: &str, e: &GpioError) {
        if self.failed {
            debug!("{}: {} still failing: {}", self.spec.name, op, e);
            return;
        }
        self.failed = true;
        error!(
            "{}: GPIO line {} {} failed: {}",
            self.spec.name, self.spec.line, op, e
        );
    }

    fn recovered(&mut self) {
        if self.failed {
            self.failed = false;
            info!("{}: GPIO line {} access restored", self.spec.name, self.spec.line);
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point")
            .field("spec", &self.spec)
            .field("bound", &self.is_bound())
            .field("commanded", &self.commanded)
            .field("pulse", &self.pulse)
            .field("observed", &self.observed)
            .field("failed", &self.failed)
            .finish()
    }
}

/// Points plus the hardware they are bound to
#[derive(Default)]
pub struct PointTable {
    // Lines must drop before the chip that produced them: keep `points` first
    points: Vec<Point>,
    index: AHashMap<String, usize>,
    chip: Option<Box<dyn GpioChip>>,
}

impl PointTable {
    /// Open the chip and request a line for every point.
    ///
    /// A point whose line cannot be acquired stays in the table, unbound and
    /// marked failed. Duplicate names keep the first entry.
    pub fn bind(driver: &dyn GpioDriver, config: &GpioTableConfig) -> Result<Self, ConfigError> {
        if config.points.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        debug!("found {} points", config.points.len());

        let mut chip = driver
            .open_chip(config.chip)
            .map_err(|e| ConfigError::ChipUnavailable(e.to_string()))?;

        let mut points: Vec<Point> = Vec::with_capacity(config.points.len());
        let mut index = AHashMap::with_capacity(config.points.len());
        let mut owners: AHashMap<u32, usize> = AHashMap::new();

        for spec in &config.points {
            if index.contains_key(&spec.name) {
                warn!(
                    "Duplicate point name {} (line {}), entry ignored",
                    spec.name, spec.line
                );
                continue;
            }

            let idx = points.len();
            let mut point = Point::new(spec.clone());

            if let Some(&owner) = owners.get(&spec.line) {
                warn!(
                    "{}: line {} already bound to {}",
                    spec.name, spec.line, points[owner].spec.name
                );
                point.failed = true;
            } else {
                match chip.request_line(&spec.line_request()) {
                    Ok(line) => {
                        point.line = Some(line);
                        owners.insert(spec.line, idx);
                        debug!(
                            "found point {}, line {}, on {}, {}",
                            spec.name,
                            spec.line,
                            u8::from(spec.active_high),
                            spec.mode.as_str()
                        );
                    },
                    Err(e) => {
                        warn!("{}: cannot request line {}: {}", spec.name, spec.line, e);
                        point.failed = true;
                    },
                }
            }

            if let Some(state) = point.read() {
                point.observed = state;
            }
            index.insert(spec.name.clone(), idx);
            points.push(point);
        }

        Ok(Self {
            points,
            index,
            chip: Some(chip),
        })
    }

    /// Release every line, then the chip
    pub fn release(&mut self) {
        let lines = self.points.iter().filter(|p| p.is_bound()).count();
        self.index.clear();
        self.points.clear();
        if self.chip.take().is_some() {
            debug!("released {} lines and the chip", lines);
        }
    }

    /// Exact-match lookup by name
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Point> {
        self.points.get(idx)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Point> {
        self.points.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn bound_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_bound()).count()
    }

    pub fn chip_label(&self) -> Option<&str> {
        self.chip.as_deref().map(|c| c.label())
    }
}

impl Drop for PointTable {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use relay_gpio::MockGpioDriver;

    fn table(points: Vec<PointSpec>) -> GpioTableConfig {
        GpioTableConfig { chip: 0, points }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(PointMode::parse(Some("input")), PointMode::Input);
        assert_eq!(PointMode::parse(Some("INPUT")), PointMode::Input);
        assert_eq!(PointMode::parse(Some("output")), PointMode::Output);
        assert_eq!(PointMode::parse(Some("relay")), PointMode::Output);
        assert_eq!(PointMode::parse(None), PointMode::Output);
    }

    #[test]
    fn test_bind_drives_off_level() {
        let driver = MockGpioDriver::new();
        let handle = driver.handle();
        let points = PointTable::bind(
            &driver,
            &table(vec![
                PointSpec::output("pump", 17, true),
                PointSpec::output("valve", 18, false),
            ]),
        )
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(handle.level(0, 17), Some(false));
        assert_eq!(handle.drive(0, 17), Some(Drive::PushPull));
        assert_eq!(handle.level(0, 18), Some(true));
        assert_eq!(handle.drive(0, 18), Some(Drive::OpenDrain));
        assert!(!points.get(1).unwrap().observed());
        assert_eq!(points.chip_label(), Some("mock0"));
    }

    #[test]
    fn test_empty_table() {
        let driver = MockGpioDriver::new();
        assert!(matches!(
            PointTable::bind(&driver, &table(vec![])),
            Err(ConfigError::EmptyTable)
        ));
    }

    #[test]
    fn test_chip_unavailable() {
        let driver = MockGpioDriver::new();
        let config = GpioTableConfig {
            chip: 3,
            points: vec![PointSpec::output("pump", 1, true)],
        };
        assert!(matches!(
            PointTable::bind(&driver, &config),
            Err(ConfigError::ChipUnavailable(_))
        ));
    }

    #[test]
    fn test_bad_line_does_not_abort_table() {
        let driver = MockGpioDriver::new();
        driver.handle().reject_line(0, 5);
        let points = PointTable::bind(
            &driver,
            &table(vec![
                PointSpec::output("broken", 5, true),
                PointSpec::input("door", 6, true),
            ]),
        )
        .unwrap();

        let broken = points.get(points.lookup("broken").unwrap()).unwrap();
        assert!(!broken.is_bound());
        assert!(broken.is_failed());
        assert!(points.get(1).unwrap().is_bound());
        assert_eq!(points.bound_count(), 1);
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let driver = MockGpioDriver::new();
        let handle = driver.handle();
        let points = PointTable::bind(
            &driver,
            &table(vec![
                PointSpec::output("pump", 1, true),
                PointSpec::output("pump", 2, true),
            ]),
        )
        .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points.get(0).unwrap().spec().line, 1);
        assert!(!handle.is_held(0, 2));
    }

    #[test]
    fn test_shared_line_is_bound_once() {
        let driver = MockGpioDriver::new();
        let points = PointTable::bind(
            &driver,
            &table(vec![
                PointSpec::output("a", 4, true),
                PointSpec::output("b", 4, true),
            ]),
        )
        .unwrap();

        assert!(points.get(0).unwrap().is_bound());
        let b = points.get(1).unwrap();
        assert!(!b.is_bound());
        assert!(b.is_failed());
    }

    #[test]
    fn test_release_frees_lines_and_chip() {
        let driver = MockGpioDriver::new();
        let handle = driver.handle();
        let mut points =
            PointTable::bind(&driver, &table(vec![PointSpec::input("door", 2, true)])).unwrap();
        assert_eq!(handle.held_count(), 1);
        assert_eq!(handle.open_chips(), 1);

        points.release();
        assert_eq!(handle.held_count(), 0);
        assert_eq!(handle.open_chips(), 0);
        assert!(points.lookup("door").is_none());
    }

    #[test]
    fn test_point_polarity() {
        let driver = MockGpioDriver::new();
        let handle = driver.handle();
        let mut points =
            PointTable::bind(&driver, &table(vec![PointSpec::output("valve", 9, false)])).unwrap();
        let valve = points.get_mut(0).unwrap();

        assert!(valve.write(true));
        assert_eq!(handle.level(0, 9), Some(false));
        assert_eq!(valve.read(), Some(true));

        assert!(valve.write(false));
        assert_eq!(handle.level(0, 9), Some(true));
        assert_eq!(valve.read(), Some(false));
    }

    #[test]
    fn test_failed_flag_clears_on_success() {
        let driver = MockGpioDriver::new();
        let handle = driver.handle();
        let mut points =
            PointTable::bind(&driver, &table(vec![PointSpec::output("pump", 3, true)])).unwrap();
        let pump = points.get_mut(0).unwrap();

        handle.set_faulty(0, 3, true);
        assert!(!pump.write(true));
        assert!(pump.is_failed());
        assert!(pump.read().is_none());

        handle.set_faulty(0, 3, false);
        assert!(pump.write(true));
        assert!(!pump.is_failed());
    }
}

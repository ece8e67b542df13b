//! Mock GPIO driver
//!
//! Keeps every line level in memory. A [`MockGpioHandle`] shares the same
//! state so tests (or a simulation front end) can drive input levels, read
//! back outputs and inject faults while the engine owns the lines.

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::driver::{Drive, GpioChip, GpioDriver, GpioLine, LineDirection, LineRequest};
use crate::error::{GpioError, Result};

type LineKey = (u32, u32);

#[derive(Debug)]
struct MockState {
    chip_count: u32,
    levels: AHashMap<LineKey, bool>,
    drives: AHashMap<LineKey, Drive>,
    held: AHashSet<LineKey>,
    rejected: AHashSet<LineKey>,
    faulty: AHashSet<LineKey>,
    writes: AHashMap<LineKey, usize>,
    requests: usize,
    open_chips: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chip_count: 1,
            levels: AHashMap::new(),
            drives: AHashMap::new(),
            held: AHashSet::new(),
            rejected: AHashSet::new(),
            faulty: AHashSet::new(),
            writes: AHashMap::new(),
            requests: 0,
            open_chips: 0,
        }
    }
}

/// Shared view of the mock hardware
#[derive(Debug, Clone, Default)]
pub struct MockGpioHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockGpioHandle {
    /// Number of chips `open_chip` accepts (default 1)
    pub fn set_chip_count(&self, count: u32) {
        self.state.lock().chip_count = count;
    }

    /// Drive the level seen on a line (simulates an external signal)
    pub fn set_level(&self, chip: u32, offset: u32, high: bool) {
        self.state.lock().levels.insert((chip, offset), high);
    }

    /// Current raw level of a line
    pub fn level(&self, chip: u32, offset: u32) -> Option<bool> {
        self.state.lock().levels.get(&(chip, offset)).copied()
    }

    /// Drive mode of a line requested as output
    pub fn drive(&self, chip: u32, offset: u32) -> Option<Drive> {
        self.state.lock().drives.get(&(chip, offset)).copied()
    }

    pub fn is_held(&self, chip: u32, offset: u32) -> bool {
        self.state.lock().held.contains(&(chip, offset))
    }

    /// Number of lines currently requested
    pub fn held_count(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Number of chip handles currently open
    pub fn open_chips(&self) -> usize {
        self.state.lock().open_chips
    }

    /// Total number of successful line requests
    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    /// Number of `set_value` calls that reached a line
    pub fn write_count(&self, chip: u32, offset: u32) -> usize {
        self.state
            .lock()
            .writes
            .get(&(chip, offset))
            .copied()
            .unwrap_or(0)
    }

    /// Make future requests for a line fail
    pub fn reject_line(&self, chip: u32, offset: u32) {
        self.state.lock().rejected.insert((chip, offset));
    }

    /// Make get/set on a line fail (or succeed again)
    pub fn set_faulty(&self, chip: u32, offset: u32, faulty: bool) {
        let mut state = self.state.lock();
        if faulty {
            state.faulty.insert((chip, offset));
        } else {
            state.faulty.remove(&(chip, offset));
        }
    }
}

/// Mock GPIO driver for testing and simulation
#[derive(Debug, Clone, Default)]
pub struct MockGpioDriver {
    handle: MockGpioHandle,
}

impl MockGpioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a driver sharing state with an existing handle
    pub fn with_handle(handle: MockGpioHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> MockGpioHandle {
        self.handle.clone()
    }
}

impl GpioDriver for MockGpioDriver {
    fn open_chip(&self, chip: u32) -> Result<Box<dyn GpioChip>> {
        let mut state = self.handle.state.lock();
        if chip >= state.chip_count {
            return Err(GpioError::ChipUnavailable(format!("mock chip {}", chip)));
        }
        state.open_chips += 1;
        Ok(Box::new(MockChip {
            chip,
            label: format!("mock{}", chip),
            handle: self.handle.clone(),
        }))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockChip {
    chip: u32,
    label: String,
    handle: MockGpioHandle,
}

impl GpioChip for MockChip {
    fn label(&self) -> &str {
        &self.label
    }

    fn request_line(&mut self, request: &LineRequest) -> Result<Box<dyn GpioLine>> {
        let key = (self.chip, request.offset);
        let mut state = self.handle.state.lock();

        if state.rejected.contains(&key) {
            return Err(GpioError::LineUnavailable {
                offset: request.offset,
                reason: "rejected by mock".to_string(),
            });
        }
        if !state.held.insert(key) {
            return Err(GpioError::LineBusy(request.offset));
        }
        state.requests += 1;

        match request.direction {
            LineDirection::Input => {
                state.drives.remove(&key);
                state.levels.entry(key).or_insert(false);
            },
            LineDirection::Output { drive, initial } => {
                state.drives.insert(key, drive);
                state.levels.insert(key, initial);
            },
        }
        debug!(
            "mock line {}:{} requested by {}",
            self.chip, request.offset, request.consumer
        );

        Ok(Box::new(MockLine {
            key,
            handle: self.handle.clone(),
        }))
    }
}

impl Drop for MockChip {
    fn drop(&mut self) {
        let mut state = self.handle.state.lock();
        state.open_chips = state.open_chips.saturating_sub(1);
    }
}

struct MockLine {
    key: LineKey,
    handle: MockGpioHandle,
}

impl MockLine {
    fn check(&self, state: &MockState) -> Result<()> {
        if state.faulty.contains(&self.key) {
            return Err(GpioError::Access {
                offset: self.key.1,
                reason: "fault injected".to_string(),
            });
        }
        Ok(())
    }
}

impl GpioLine for MockLine {
    fn offset(&self) -> u32 {
        self.key.1
    }

    fn get_value(&mut self) -> Result<bool> {
        let state = self.handle.state.lock();
        self.check(&state)?;
        Ok(state.levels.get(&self.key).copied().unwrap_or(false))
    }

    fn set_value(&mut self, high: bool) -> Result<()> {
        let mut state = self.handle.state.lock();
        self.check(&state)?;
        state.levels.insert(self.key, high);
        *state.writes.entry(self.key).or_insert(0) += 1;
        Ok(())
    }
}

impl Drop for MockLine {
    fn drop(&mut self) {
        self.handle.state.lock().held.remove(&self.key);
    }
}

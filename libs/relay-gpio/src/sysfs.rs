//! Sysfs GPIO driver for Linux
//!
//! Chips are enumerated from `gpiochip*` entries under the base path and
//! ordered by their `base` number, so chip `N` is the N-th controller.
//! Lines are exported on request and unexported when the handle is dropped
//! (only if this process exported them). Sysfs has no open-drain flag:
//! open-drain lines drive low by direction `low` and release by switching
//! to input.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::driver::{Drive, GpioChip, GpioDriver, GpioLine, LineDirection, LineRequest};
use crate::error::{GpioError, Result};

/// Sysfs GPIO driver
pub struct SysfsGpioDriver {
    base_path: PathBuf,
}

impl SysfsGpioDriver {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn read_number(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }
}

impl Default for SysfsGpioDriver {
    fn default() -> Self {
        Self::new("/sys/class/gpio")
    }
}

impl GpioDriver for SysfsGpioDriver {
    fn open_chip(&self, chip: u32) -> Result<Box<dyn GpioChip>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            GpioError::ChipUnavailable(format!("{}: {}", self.base_path.display(), e))
        })?;

        let mut chips: Vec<(u32, u32, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("gpiochip"))
            .filter_map(|entry| {
                let dir = entry.path();
                let base = Self::read_number(&dir.join("base"))?;
                let ngpio = Self::read_number(&dir.join("ngpio")).unwrap_or(u32::MAX);
                let label = fs::read_to_string(dir.join("label"))
                    .map(|l| l.trim().to_string())
                    .unwrap_or_else(|_| entry.file_name().to_string_lossy().into_owned());
                Some((base, ngpio, label))
            })
            .collect();
        chips.sort_by_key(|(base, _, _)| *base);

        let (gpio_base, ngpio, label) = chips
            .into_iter()
            .nth(chip as usize)
            .ok_or_else(|| GpioError::ChipUnavailable(format!("gpiochip index {}", chip)))?;

        debug!(
            "Opened sysfs chip {} ({}): base {}, {} lines",
            chip, label, gpio_base, ngpio
        );

        Ok(Box::new(SysfsChip {
            base_path: self.base_path.clone(),
            gpio_base,
            ngpio,
            label,
        }))
    }

    fn is_available(&self) -> bool {
        self.base_path.exists()
    }

    fn name(&self) -> &'static str {
        "sysfs"
    }
}

struct SysfsChip {
    base_path: PathBuf,
    gpio_base: u32,
    ngpio: u32,
    label: String,
}

impl GpioChip for SysfsChip {
    fn label(&self) -> &str {
        &self.label
    }

    fn request_line(&mut self, request: &LineRequest) -> Result<Box<dyn GpioLine>> {
        let offset = request.offset;
        if offset >= self.ngpio {
            return Err(GpioError::LineUnavailable {
                offset,
                reason: format!("chip {} has {} lines", self.label, self.ngpio),
            });
        }

        let gpio_number = self.gpio_base + offset;
        let gpio_path = self.base_path.join(format!("gpio{}", gpio_number));

        // Dropping `export` on any error below unexports a line we exported
        let mut export = Export {
            base_path: self.base_path.clone(),
            gpio_number,
            owned: false,
        };
        if !gpio_path.exists() {
            match fs::write(self.base_path.join("export"), gpio_number.to_string()) {
                Ok(()) => export.owned = true,
                // Ignore "device busy" errors (already exported)
                Err(e) if e.raw_os_error() == Some(16) => {},
                Err(e) => return Err(GpioError::io(offset, e)),
            }
        }
        if !gpio_path.exists() {
            return Err(GpioError::LineUnavailable {
                offset,
                reason: format!("{} missing after export", gpio_path.display()),
            });
        }

        let (drive, direction) = match request.direction {
            LineDirection::Input => (None, "in"),
            LineDirection::Output { drive, initial } => {
                (Some(drive), output_direction(drive, initial))
            },
        };
        let direction_path = gpio_path.join("direction");
        fs::write(&direction_path, direction).map_err(|e| GpioError::io(offset, e))?;

        debug!(
            "GPIO {} requested as {} for {}",
            gpio_number, direction, request.consumer
        );

        Ok(Box::new(SysfsLine {
            value_path: gpio_path.join("value"),
            direction_path,
            drive,
            offset,
            export,
        }))
    }
}

/// Direction string for an output level.
///
/// Writing "low"/"high" sets direction and level atomically. Open drain
/// is emulated: the high level releases the line by switching it to input.
fn output_direction(drive: Drive, high: bool) -> &'static str {
    match (drive, high) {
        (Drive::OpenDrain, true) => "in",
        (_, false) => "low",
        (Drive::PushPull, true) => "high",
    }
}

/// Export claim on one GPIO, unexported on drop if this process made it
struct Export {
    base_path: PathBuf,
    gpio_number: u32,
    owned: bool,
}

impl Drop for Export {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = fs::write(
            self.base_path.join("unexport"),
            self.gpio_number.to_string(),
        ) {
            warn!("Failed to unexport GPIO {}: {}", self.gpio_number, e);
        }
    }
}

struct SysfsLine {
    value_path: PathBuf,
    direction_path: PathBuf,
    /// `None` for inputs
    drive: Option<Drive>,
    offset: u32,
    export: Export,
}

impl GpioLine for SysfsLine {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn get_value(&mut self) -> Result<bool> {
        let content =
            fs::read_to_string(&self.value_path).map_err(|e| GpioError::io(self.offset, e))?;
        Ok(content.trim() == "1")
    }

    fn set_value(&mut self, high: bool) -> Result<()> {
        if self.drive == Some(Drive::OpenDrain) {
            let direction = output_direction(Drive::OpenDrain, high);
            return fs::write(&self.direction_path, direction)
                .map_err(|e| GpioError::io(self.offset, e));
        }
        let content = if high { "1" } else { "0" };
        fs::write(&self.value_path, content).map_err(|e| GpioError::io(self.offset, e))
    }
}

impl fmt::Debug for SysfsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysfsLine")
            .field("gpio", &self.export.gpio_number)
            .field("drive", &self.drive)
            .field("owned", &self.export.owned)
            .finish()
    }
}

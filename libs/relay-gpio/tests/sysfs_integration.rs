//! Sysfs driver integration tests
//!
//! Builds a fake `/sys/class/gpio` tree in a temporary directory so the
//! driver can be exercised without GPIO hardware.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;
use std::path::Path;

use relay_gpio::{Drive, GpioChip, GpioDriver, GpioError, GpioLine, LineRequest, SysfsGpioDriver};
use tempfile::TempDir;

/// Temporary sysfs GPIO tree with two controllers:
/// gpiochip0 (base 0, 32 lines) and gpiochip504 (base 504, 8 lines)
struct TempGpioFs {
    dir: TempDir,
}

impl TempGpioFs {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("export"), "").unwrap();
        fs::write(root.join("unexport"), "").unwrap();
        Self::add_chip(root, 0, 32, "pinctrl-bcm2835");
        Self::add_chip(root, 504, 8, "raspberrypi-exp-gpio");
        Self { dir }
    }

    fn add_chip(root: &Path, base: u32, ngpio: u32, label: &str) {
        let chip = root.join(format!("gpiochip{}", base));
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("base"), format!("{}\n", base)).unwrap();
        fs::write(chip.join("ngpio"), format!("{}\n", ngpio)).unwrap();
        fs::write(chip.join("label"), format!("{}\n", label)).unwrap();
    }

    /// Pretend the kernel already exported this GPIO
    fn setup_gpio(&self, gpio_number: u32, value: bool) {
        let gpio = self.path().join(format!("gpio{}", gpio_number));
        fs::create_dir_all(&gpio).unwrap();
        fs::write(gpio.join("direction"), "in").unwrap();
        fs::write(gpio.join("value"), if value { "1\n" } else { "0\n" }).unwrap();
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative))
            .unwrap()
            .trim()
            .to_string()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn test_chips_are_ordered_by_base() {
    let gpio = TempGpioFs::new();
    let driver = SysfsGpioDriver::new(gpio.path());

    assert!(driver.is_available());
    assert_eq!(driver.open_chip(0).unwrap().label(), "pinctrl-bcm2835");
    assert_eq!(driver.open_chip(1).unwrap().label(), "raspberrypi-exp-gpio");
    assert!(matches!(
        driver.open_chip(2),
        Err(GpioError::ChipUnavailable(_))
    ));
}

#[test]
fn test_output_line_direction_and_value() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(506, true);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip: Box<dyn GpioChip> = driver.open_chip(1).unwrap();
    let mut line: Box<dyn GpioLine> = chip
        .request_line(&LineRequest::output(2, "pump", Drive::PushPull, false))
        .unwrap();

    assert_eq!(line.offset(), 2);
    assert_eq!(gpio.read("gpio506/direction"), "low");

    line.set_value(true).unwrap();
    assert_eq!(gpio.read("gpio506/value"), "1");
    assert!(line.get_value().unwrap());

    line.set_value(false).unwrap();
    assert!(!line.get_value().unwrap());
}

#[test]
fn test_input_line_reads_value() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(17, true);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(0).unwrap();
    let mut line = chip.request_line(&LineRequest::input(17, "door")).unwrap();

    assert_eq!(gpio.read("gpio17/direction"), "in");
    assert!(line.get_value().unwrap());
}

#[test]
fn test_missing_line_is_exported_then_rejected() {
    let gpio = TempGpioFs::new();
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(0).unwrap();
    let result = chip.request_line(&LineRequest::input(5, "ghost"));

    assert_eq!(gpio.read("export"), "5");
    assert!(matches!(
        result,
        Err(GpioError::LineUnavailable { offset: 5, .. })
    ));
    // the failed request gives back the export it made
    assert_eq!(gpio.read("unexport"), "5");
}

#[test]
fn test_open_drain_switches_direction() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(9, false);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip: Box<dyn GpioChip> = driver.open_chip(0).unwrap();
    let mut line = chip
        .request_line(&LineRequest::output(9, "valve", Drive::OpenDrain, true))
        .unwrap();
    // released: high comes from the pull-up
    assert_eq!(gpio.read("gpio9/direction"), "in");

    line.set_value(false).unwrap();
    assert_eq!(gpio.read("gpio9/direction"), "low");

    line.set_value(true).unwrap();
    assert_eq!(gpio.read("gpio9/direction"), "in");
    // the value file is never written for open drain
    assert_eq!(gpio.read("gpio9/value"), "0");
}

#[test]
fn test_open_drain_initial_low() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(10, true);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(0).unwrap();
    let _line = chip
        .request_line(&LineRequest::output(10, "valve", Drive::OpenDrain, false))
        .unwrap();
    assert_eq!(gpio.read("gpio10/direction"), "low");
}

#[test]
fn test_push_pull_writes_value() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(11, false);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(0).unwrap();
    let mut line = chip
        .request_line(&LineRequest::output(11, "pump", Drive::PushPull, true))
        .unwrap();
    assert_eq!(gpio.read("gpio11/direction"), "high");

    line.set_value(false).unwrap();
    assert_eq!(gpio.read("gpio11/direction"), "high");
    assert_eq!(gpio.read("gpio11/value"), "0");
}

#[test]
fn test_offset_beyond_chip_is_rejected() {
    let gpio = TempGpioFs::new();
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(1).unwrap();
    assert!(matches!(
        chip.request_line(&LineRequest::input(8, "overflow")),
        Err(GpioError::LineUnavailable { offset: 8, .. })
    ));
}

#[test]
fn test_preexported_line_is_not_unexported() {
    let gpio = TempGpioFs::new();
    gpio.setup_gpio(3, false);
    let driver = SysfsGpioDriver::new(gpio.path());

    let mut chip = driver.open_chip(0).unwrap();
    let line = chip.request_line(&LineRequest::input(3, "x")).unwrap();
    drop(line);

    assert_eq!(gpio.read("unexport"), "");
}

#[test]
fn test_missing_base_path() {
    let driver = SysfsGpioDriver::new("/nonexistent/gpio/base");
    assert!(!driver.is_available());
    assert!(matches!(
        driver.open_chip(0),
        Err(GpioError::ChipUnavailable(_))
    ));
}

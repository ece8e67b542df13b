//! Service configuration
//!
//! Loaded with figment from a JSON file (default `/etc/house/relays.json`)
//! merged with `RELAYSRV_` environment overrides, nested keys split on
//! `__` (e.g. `RELAYSRV_GPIO__BACKEND=mock`).
//!
//! ```json
//! {
//!   "relays": {
//!     "iochip": 0,
//!     "points": [
//!       { "name": "pump", "gpio": 17, "on": 1 },
//!       { "name": "door", "gpio": 22, "on": 0, "mode": "input" }
//!     ]
//!   },
//!   "gpio": { "backend": "sysfs" },
//!   "sampling": { "depth": 256, "quantum_ms": 50 }
//! }
//! ```

use std::path::{Path, PathBuf};

use errors::ConfigError;
use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use relay_gpio::GpioBackend;
use serde::{Deserialize, Serialize};

use crate::points::{PointMode, PointSpec};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/house/relays.json";
pub const ENV_PREFIX: &str = "RELAYSRV_";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaysConfig {
    #[serde(default)]
    pub relays: RelaysSection,
    #[serde(default)]
    pub gpio: GpioBackend,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// The point table as written in the file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaysSection {
    #[serde(default)]
    pub iochip: u32,
    /// `None` when the array is missing altogether
    #[serde(default)]
    pub points: Option<Vec<PointConfig>>,
}

/// One point entry as written in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,
    #[serde(default)]
    pub gpio: u32,
    /// Raw level meaning "on"; required, only the low bit is significant
    pub on: i64,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub gear: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<&PointConfig> for PointSpec {
    fn from(point: &PointConfig) -> Self {
        Self {
            name: point.name.clone(),
            line: point.gpio,
            active_high: point.on & 1 == 1,
            mode: PointMode::parse(point.mode.as_deref()),
            gear: point.gear.clone(),
            description: point.description.clone(),
        }
    }
}

/// Sample ring and gating parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Ring depth D (slots)
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Sampling period Q in milliseconds
    #[serde(default = "default_quantum_ms")]
    pub quantum_ms: u64,
    /// Sampling stops after this long without a change query
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Upper bound on sampled input points
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

fn default_depth() -> usize {
    256
}

fn default_quantum_ms() -> u64 {
    50
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_max_points() -> usize {
    64
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            quantum_ms: default_quantum_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_points: default_max_points(),
        }
    }
}

impl SamplingConfig {
    /// Retained span D x Q in milliseconds
    pub fn span_ms(&self) -> u64 {
        self.depth as u64 * self.quantum_ms
    }
}

/// Command history parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_depth")]
    pub depth: usize,
}

fn default_history_depth() -> usize {
    1024
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: default_history_depth(),
        }
    }
}

impl RelaysConfig {
    /// Load from a JSON file plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::Load(format!(
                "cannot access config file {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::new()
                .merge(Json::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Parse a JSON document, without environment overrides
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::new().merge(Json::string(json)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Check parameters that would make the engine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.depth < 2 {
            return Err(ConfigError::invalid("sampling.depth", "must be at least 2"));
        }
        if self.sampling.quantum_ms == 0 {
            return Err(ConfigError::invalid(
                "sampling.quantum_ms",
                "must be at least 1",
            ));
        }
        if self.sampling.max_points == 0 {
            return Err(ConfigError::invalid(
                "sampling.max_points",
                "must be at least 1",
            ));
        }
        if self.history.depth == 0 {
            return Err(ConfigError::invalid("history.depth", "must be at least 1"));
        }
        if let Some(points) = &self.relays.points {
            if let Some(point) = points.iter().find(|p| p.name.is_empty()) {
                return Err(ConfigError::invalid(
                    "relays.points.name",
                    format!("empty name for gpio {}", point.gpio),
                ));
            }
        }
        Ok(())
    }

    /// Point specifications for the engine
    pub fn table(&self) -> Result<GpioTableConfig, ConfigError> {
        let points = self
            .relays
            .points
            .as_ref()
            .ok_or(ConfigError::MissingPoints)?;
        Ok(GpioTableConfig {
            chip: self.relays.iochip,
            points: points.iter().map(PointSpec::from).collect(),
        })
    }
}

/// Chip number plus ordered point specifications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioTableConfig {
    pub chip: u32,
    pub points: Vec<PointSpec>,
}

/// Where `refresh` re-derives the point table from
pub trait PointSource: Send {
    fn load_table(&mut self) -> Result<GpioTableConfig, ConfigError>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

impl PointSource for GpioTableConfig {
    fn load_table(&mut self) -> Result<GpioTableConfig, ConfigError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("static table ({} points)", self.points.len())
    }
}

/// Configuration file, re-read on every refresh
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl PointSource for ConfigFile {
    fn load_table(&mut self) -> Result<GpioTableConfig, ConfigError> {
        let config = RelaysConfig::load(&self.path)?;
        config.validate()?;
        config.table()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "relays": {
            "iochip": 1,
            "points": [
                { "name": "pump", "gpio": 17, "on": 1, "gear": "relay", "description": "Pool pump" },
                { "name": "valve", "gpio": 18, "on": 0 },
                { "name": "sensor", "gpio": 22, "on": 3, "mode": "Input" }
            ]
        }
    }"#;

    #[test]
    fn test_parse_points() {
        let config = RelaysConfig::from_json(SAMPLE).unwrap();
        let table = config.table().unwrap();

        assert_eq!(table.chip, 1);
        assert_eq!(table.points.len(), 3);
        assert_eq!(table.points[0].gear.as_deref(), Some("relay"));
        assert!(table.points[0].active_high);
        assert!(!table.points[1].active_high);
        assert_eq!(table.points[1].mode, PointMode::Output);
        // on is masked to its low bit
        assert!(table.points[2].active_high);
        assert_eq!(table.points[2].mode, PointMode::Input);
    }

    #[test]
    fn test_defaults() {
        let config = RelaysConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.sampling, SamplingConfig::default());
        assert_eq!(config.sampling.span_ms(), 256 * 50);
        assert_eq!(config.history.depth, 1024);
        assert_eq!(config.gpio, GpioBackend::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_points_array() {
        let config = RelaysConfig::from_json(r#"{"relays": {"iochip": 0}}"#).unwrap();
        assert!(matches!(config.table(), Err(ConfigError::MissingPoints)));
    }

    #[test]
    fn test_point_without_polarity_is_rejected() {
        let result =
            RelaysConfig::from_json(r#"{"relays": {"points": [{"name": "pump", "gpio": 17}]}}"#);
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_empty_points_array_is_not_missing() {
        let config = RelaysConfig::from_json(r#"{"relays": {"points": []}}"#).unwrap();
        assert!(config.table().unwrap().points.is_empty());
    }

    #[test]
    fn test_validation() {
        let mut config = RelaysConfig::from_json(SAMPLE).unwrap();
        config.sampling.depth = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));

        let mut config = RelaysConfig::from_json(SAMPLE).unwrap();
        config.sampling.quantum_ms = 0;
        assert!(config.validate().is_err());

        let config =
            RelaysConfig::from_json(r#"{"relays": {"points": [{"name": "", "gpio": 3, "on": 1}]}}"#)
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mock_backend_from_file() {
        let config =
            RelaysConfig::from_json(r#"{"gpio": {"backend": "mock"}, "relays": {"points": []}}"#)
                .unwrap();
        assert_eq!(config.gpio, GpioBackend::Mock);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RelaysConfig::load("/nonexistent/relays.json"),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_config_file_source_rereads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relays.json");
        fs::write(&path, SAMPLE).unwrap();

        let mut source = ConfigFile::new(&path);
        assert_eq!(source.load_table().unwrap().points.len(), 3);

        fs::write(
            &path,
            r#"{"relays": {"points": [{"name": "pump", "gpio": 17, "on": 1}]}}"#,
        )
        .unwrap();
        assert_eq!(source.load_table().unwrap().points.len(), 1);
        assert!(source.describe().ends_with("relays.json"));
    }

    #[test]
    fn test_static_source() {
        let mut source = GpioTableConfig {
            chip: 0,
            points: vec![PointSpec::output("pump", 1, true)],
        };
        assert_eq!(source.load_table().unwrap(), source.clone());
    }
}

//! Configuration loading for the view synchronizer.
//!
//! All settings are loaded from a TOML configuration file. Every section has
//! defaults, so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete view synchronizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSyncConfig {
    /// Network cadence and service location
    #[serde(default)]
    pub sync: SyncConfig,
    /// Position easing settings
    #[serde(default)]
    pub motion: MotionConfig,
    /// Occupancy heat rendering settings
    #[serde(default)]
    pub heat: HeatConfig,
    /// Batch report settings
    #[serde(default)]
    pub batch: BatchConfig,
}

impl ViewSyncConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::TomlError)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, TomlSerializeError> {
        toml::to_string_pretty(self).map_err(TomlSerializeError)
    }

    /// Rejects values the scheduler or reconciler cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let motion = &self.motion;
        if !(motion.ease_fraction > 0.0 && motion.ease_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "motion.ease_fraction must be in (0, 1], got {}",
                motion.ease_fraction
            )));
        }
        if !(motion.deadband >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "motion.deadband must be non-negative, got {}",
                motion.deadband
            )));
        }
        if !(motion.world_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "motion.world_scale must be positive, got {}",
                motion.world_scale
            )));
        }
        if self.sync.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.tick_interval_ms must be greater than zero".into(),
            ));
        }
        if self.sync.steps_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "sync.steps_per_tick must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Network cadence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the simulation service API
    pub base_url: String,
    /// Period of the tick cadence while running
    pub tick_interval_ms: u64,
    /// Simulation steps requested per cadence tick
    pub steps_per_tick: u32,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// Whether the cadence starts in the running state
    pub start_running: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: world_client::DEFAULT_BASE_URL.to_string(),
            tick_interval_ms: 1800,
            steps_per_tick: 1,
            request_timeout_ms: world_client::DEFAULT_TIMEOUT.as_millis() as u64,
            start_running: true,
        }
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Position easing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Share of the remaining offset closed per frame
    pub ease_fraction: f32,
    /// Offset (display units, per axis) below which positions snap to target
    pub deadband: f32,
    /// Display units per world grid unit
    pub world_scale: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            ease_fraction: 0.22,
            deadband: 0.5,
            world_scale: 20.0,
        }
    }
}

/// Occupancy heat circle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    /// Radius of an empty POI
    pub min_radius: f32,
    /// Extra radius at maximum occupancy
    pub radius_span: f32,
    /// Opacity of an empty POI
    pub base_opacity: f32,
    /// Extra opacity at maximum occupancy, before clamping
    pub opacity_span: f32,
    /// Opacity ceiling
    pub max_opacity: f32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            min_radius: 12.0,
            radius_span: 40.0,
            base_opacity: 0.15,
            opacity_span: 0.7,
            max_opacity: 0.75,
        }
    }
}

/// Batch report configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Ticks requested when the user does not choose a count
    pub default_ticks: u32,
    /// Whether the service reloads its seed world before the batch
    pub reset_seed: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_ticks: 240,
            reset_seed: true,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    IoError(std::io::Error),
    /// Error parsing TOML config
    TomlError(toml::de::Error),
    /// A value is out of range
    Invalid(String),
}

/// Error that can occur during TOML serialization.
#[derive(Debug)]
pub struct TomlSerializeError(pub toml::ser::Error);

impl std::fmt::Display for TomlSerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TOML serialize error: {}", self.0)
    }
}

impl std::error::Error for TomlSerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::TomlError(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# World viewer configuration

[sync]
base_url = "http://localhost:5000/api"
tick_interval_ms = 1800
steps_per_tick = 1
request_timeout_ms = 20000
start_running = true

[motion]
ease_fraction = 0.22
deadband = 0.5
world_scale = 20.0

[heat]
min_radius = 12.0
radius_span = 40.0
base_opacity = 0.15
opacity_span = 0.7
max_opacity = 0.75

[batch]
default_ticks = 240
reset_seed = true
"#
    .to_string()
}

//! Runtime configuration loaded from a TOML file.
//!
//! Every section is optional; missing keys fall back to the defaults of a
//! stock Enviro+ deployment.

use crate::error::{EnviroError, Result};
use crate::units::UnitSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub use crate::web::config::WebConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnviroConfig {
    pub server: WebConfig,
    pub sampling: SamplingConfig,
    pub units: UnitsConfig,
    pub compensation: CompensationConfig,
    pub sensors: SensorsConfig,
    pub display: DisplayConfig,
    pub fan: FanConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between sample ticks
    pub idle_time_secs: u64,
    /// Minutes between persisted readings; must divide an hour
    pub save_interval_minutes: u32,
    /// Directory holding one JSON log per calendar day
    pub data_dir: PathBuf,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            idle_time_secs: 2,
            save_interval_minutes: 15,
            data_dir: PathBuf::from("enviroplusweb-data"),
        }
    }
}

impl SamplingConfig {
    pub fn idle_time(&self) -> Duration {
        Duration::from_secs(self.idle_time_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    pub system: UnitSystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensationConfig {
    /// Correct temperature against the CPU moving average instead of scaling it
    pub temp_cpu_compensation: bool,
    pub temp_factor: f64,
    pub humi_factor: f64,
    /// Added to pressure after unit conversion
    pub pres_factor: f64,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            temp_cpu_compensation: true,
            temp_factor: 3.10,
            humi_factor: 1.40,
            pres_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub gas: bool,
    pub particulate: bool,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            gas: true,
            particulate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub lcd_enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { lcd_enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    pub enabled: bool,
    pub gpio_pin: u8,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gpio_pin: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub latitude: String,
    pub longitude: String,
    pub api_key: String,
    pub api_url: String,
    pub call_interval_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            latitude: String::new(),
            longitude: String::new(),
            api_key: String::new(),
            api_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            call_interval_secs: 600,
        }
    }
}

impl WeatherConfig {
    pub fn call_interval(&self) -> Duration {
        Duration::from_secs(self.call_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,
}

impl EnviroConfig {
    /// Load and validate configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EnviroError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EnviroConfig = toml::from_str(content)
            .map_err(|e| EnviroError::config_error(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, else from `enviro.toml` in the working
    /// directory if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let fallback = PathBuf::from("enviro.toml");
        if fallback.exists() {
            info!("Loading configuration from {}", fallback.display());
            return Self::load(&fallback);
        }

        warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors.particulate && !self.sensors.gas {
            return Err(EnviroError::config_error(
                "particulate sensor requires the gas sensor board",
            ));
        }
        if self.sampling.idle_time_secs == 0 {
            return Err(EnviroError::config_error("idle_time_secs must be positive"));
        }
        let save = self.sampling.save_interval_minutes;
        if save == 0 || 60 % save != 0 {
            return Err(EnviroError::config_error(format!(
                "save_interval_minutes must divide 60, got {}",
                save
            )));
        }
        if self.weather.enabled && self.weather.api_key.is_empty() {
            return Err(EnviroError::config_error(
                "weather integration enabled without an api_key",
            ));
        }
        if self.compensation.temp_cpu_compensation && self.compensation.temp_factor == 0.0 {
            return Err(EnviroError::config_error(
                "temp_factor must be non-zero for CPU compensation",
            ));
        }
        Ok(())
    }

    pub fn units(&self) -> UnitSystem {
        self.units.system
    }
}

//! Driver seams for the physical sensors.
//!
//! Each trait is the opaque boundary to one device on the board. Values come
//! back raw (°C, %, hPa, lux, Ω, µg/m³); compensation and unit conversion are
//! applied by the sampler.

use crate::error::SensorError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Default CPU thermal zone on Raspberry Pi OS.
pub const CPU_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Noise amplitude per frequency band, as fractions of full scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub amp: f64,
}

/// Gas sensor resistances in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasResistances {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

/// Atmospheric particulate concentrations in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticulateFrame {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
}

/// Combined temperature/humidity/pressure sensor (BME280 on the Enviro board).
#[async_trait]
pub trait EnvironmentSensor: Send {
    async fn temperature(&mut self) -> Result<f64, SensorError>;
    async fn humidity(&mut self) -> Result<f64, SensorError>;
    async fn pressure(&mut self) -> Result<f64, SensorError>;
}

/// A heat source co-located with the environment sensor, used for compensation.
#[async_trait]
pub trait ReferenceThermometer: Send {
    async fn temperature(&mut self) -> Result<f64, SensorError>;
}

#[async_trait]
pub trait LightSensor: Send {
    async fn lux(&mut self) -> Result<f64, SensorError>;
}

#[async_trait]
pub trait NoiseSensor: Send {
    async fn noise_profile(&mut self) -> Result<NoiseProfile, SensorError>;
}

#[async_trait]
pub trait GasSensor: Send {
    async fn read_all(&mut self) -> Result<GasResistances, SensorError>;
}

/// Serial particulate sensor (PMS5003). Reads can fail on noisy frames.
#[async_trait]
pub trait ParticulateSensor: Send {
    async fn read(&mut self) -> Result<ParticulateFrame, SensorError>;

    /// Re-initialize the device before another read attempt.
    async fn reset(&mut self) -> Result<(), SensorError>;
}

/// CPU temperature from a sysfs thermal zone, in millidegrees.
#[derive(Debug, Clone)]
pub struct SysfsThermometer {
    path: PathBuf,
}

impl SysfsThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SysfsThermometer {
    fn default() -> Self {
        Self::new(CPU_THERMAL_ZONE)
    }
}

#[async_trait]
impl ReferenceThermometer for SysfsThermometer {
    async fn temperature(&mut self) -> Result<f64, SensorError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SensorError::Reference(format!("{}: {}", self.path.display(), e)))?;
        let millidegrees = raw
            .trim()
            .parse::<i64>()
            .map_err(|e| SensorError::Reference(format!("unparseable thermal zone: {}", e)))?;
        Ok(millidegrees as f64 / 1000.0)
    }
}

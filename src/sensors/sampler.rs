//! Composition of a full [`Reading`] from every enabled sensor.

use crate::config::{CompensationConfig, EnviroConfig};
use crate::error::SensorError;
use crate::sensors::compensation::TemperatureCompensation;
use crate::sensors::drivers::{
    EnvironmentSensor, GasSensor, LightSensor, NoiseSensor, ParticulateFrame, ParticulateSensor,
    ReferenceThermometer,
};
use crate::sensors::reading::{keys, Reading};
use crate::shutdown::Shutdown;
use crate::units::{round_to, UnitSystem};
use crate::weather::{wind_readings, WeatherCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Wait between particulate read attempts.
pub const PARTICULATE_BACKOFF: Duration = Duration::from_secs(30);

/// The device drivers for one sensor board.
pub struct SensorDrivers {
    pub environment: Box<dyn EnvironmentSensor>,
    pub reference: Box<dyn ReferenceThermometer>,
    pub light: Box<dyn LightSensor>,
    pub noise: Box<dyn NoiseSensor>,
    pub gas: Option<Box<dyn GasSensor>>,
    pub particulate: Option<Box<dyn ParticulateSensor>>,
}

/// Samples all sensors and applies compensation and unit conversion.
pub struct SensorArray {
    drivers: SensorDrivers,
    weather: Option<Arc<WeatherCache>>,
    units: UnitSystem,
    temperature: TemperatureCompensation,
    humidity_factor: f64,
    pressure_offset: f64,
    particulate_backoff: Duration,
}

impl SensorArray {
    pub fn new(drivers: SensorDrivers, units: UnitSystem, compensation: &CompensationConfig) -> Self {
        Self {
            drivers,
            weather: None,
            units,
            temperature: TemperatureCompensation::from_config(compensation),
            humidity_factor: compensation.humi_factor,
            pressure_offset: compensation.pres_factor,
            particulate_backoff: PARTICULATE_BACKOFF,
        }
    }

    /// Build from configuration; disabled gas/particulate drivers are dropped.
    pub fn from_config(
        config: &EnviroConfig,
        mut drivers: SensorDrivers,
        weather: Option<Arc<WeatherCache>>,
    ) -> Self {
        if !config.sensors.gas {
            drivers.gas = None;
        }
        if !config.sensors.particulate {
            drivers.particulate = None;
        }
        let mut array = Self::new(drivers, config.units(), &config.compensation);
        array.weather = weather;
        array
    }

    pub fn with_weather(mut self, weather: Arc<WeatherCache>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_particulate_backoff(mut self, backoff: Duration) -> Self {
        self.particulate_backoff = backoff;
        self
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    /// Take one complete sample.
    ///
    /// Key order is fixed: time, temperature, humidity, pressure, light,
    /// noise, then wind, gas and particulates when enabled. A failing sensor
    /// yields absent values for its keys. Only the particulate sensor can fail
    /// the whole sample, and only once shutdown has been raised.
    pub async fn sample(&mut self, shutdown: &Shutdown) -> Result<Reading, SensorError> {
        let mut reading = Reading::now();

        reading.extend(self.temperature_readings().await);
        reading.extend(self.humidity_readings().await);
        reading.extend(self.pressure_readings().await);
        reading.extend(self.light_readings().await);
        reading.extend(self.noise_readings().await);

        if let Some(weather) = &self.weather {
            let payload = weather.get().await;
            reading.extend(wind_readings(&payload, self.units));
        }

        if let Some(gas) = self.drivers.gas.as_mut() {
            reading.extend(gas_readings(gas.as_mut()).await);
        }

        if let Some(particulate) = self.drivers.particulate.as_mut() {
            let frame =
                read_particulates(particulate.as_mut(), self.particulate_backoff, shutdown).await?;
            reading.extend(particulate_readings(frame));
        }

        debug!("Sampled {} metrics at {}", reading.len(), reading.formatted_time());
        Ok(reading)
    }

    async fn temperature_readings(&mut self) -> [(&'static str, Option<f64>); 1] {
        let raw = match self.drivers.environment.temperature().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Temperature read failed: {}", e);
                return [(keys::TEMPERATURE, None)];
            }
        };

        let reference = if self.temperature.needs_reference() {
            match self.drivers.reference.temperature().await {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Reference temperature read failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let compensated = self.temperature.apply(raw, reference);
        let value = round_to(self.units.temperature(compensated), 1);
        [(keys::TEMPERATURE, Some(value))]
    }

    async fn humidity_readings(&mut self) -> [(&'static str, Option<f64>); 1] {
        let value = match self.drivers.environment.humidity().await {
            Ok(raw) => Some(round_to(raw * self.humidity_factor, 1)),
            Err(e) => {
                warn!("Humidity read failed: {}", e);
                None
            }
        };
        [(keys::HUMIDITY, value)]
    }

    async fn pressure_readings(&mut self) -> [(&'static str, Option<f64>); 1] {
        let value = match self.drivers.environment.pressure().await {
            Ok(raw) => {
                let pressure = self.units.pressure(raw) + self.pressure_offset;
                Some(round_to(pressure, self.units.pressure_precision()))
            }
            Err(e) => {
                warn!("Pressure read failed: {}", e);
                None
            }
        };
        [(keys::PRESSURE, value)]
    }

    async fn light_readings(&mut self) -> [(&'static str, Option<f64>); 1] {
        let value = match self.drivers.light.lux().await {
            Ok(lux) => Some(lux.round()),
            Err(e) => {
                warn!("Light read failed: {}", e);
                None
            }
        };
        [(keys::LIGHT, value)]
    }

    async fn noise_readings(&mut self) -> [(&'static str, Option<f64>); 4] {
        match self.drivers.noise.noise_profile().await {
            Ok(profile) => [
                (keys::NOISE_HIGH, Some(round_to(profile.high * 128.0, 2))),
                (keys::NOISE_MID, Some(round_to(profile.mid * 128.0, 2))),
                (keys::NOISE_LOW, Some(round_to(profile.low * 128.0, 2))),
                (keys::NOISE_AMP, Some(round_to(profile.amp * 64.0, 2))),
            ],
            Err(e) => {
                warn!("Noise read failed: {}", e);
                [
                    (keys::NOISE_HIGH, None),
                    (keys::NOISE_MID, None),
                    (keys::NOISE_LOW, None),
                    (keys::NOISE_AMP, None),
                ]
            }
        }
    }
}

async fn gas_readings(gas: &mut dyn GasSensor) -> [(&'static str, Option<f64>); 3] {
    match gas.read_all().await {
        Ok(gases) => [
            (keys::OXIDISING, Some(round_to(gases.oxidising / 1000.0, 1))),
            (keys::REDUCING, Some((gases.reducing / 1000.0).round())),
            (keys::NH3, Some((gases.nh3 / 1000.0).round())),
        ],
        Err(e) => {
            warn!("Gas read failed: {}", e);
            [(keys::OXIDISING, None), (keys::REDUCING, None), (keys::NH3, None)]
        }
    }
}

fn particulate_readings(frame: ParticulateFrame) -> [(&'static str, Option<f64>); 3] {
    [
        (keys::PM1, Some(f64::from(frame.pm1_0))),
        (keys::PM25, Some(f64::from(frame.pm2_5))),
        (keys::PM10, Some(f64::from(frame.pm10))),
    ]
}

/// Read a particulate frame, retrying until one is valid.
///
/// Each failed attempt resets the device and waits `backoff` before the next.
/// If shutdown has been raised when an attempt fails, the failure is returned
/// as [`SensorError::Cancelled`] instead of retrying.
pub async fn read_particulates(
    sensor: &mut dyn ParticulateSensor,
    backoff: Duration,
    shutdown: &Shutdown,
) -> Result<ParticulateFrame, SensorError> {
    loop {
        match sensor.read().await {
            Ok(frame) => return Ok(frame),
            Err(e) => {
                error!("Particle read failed: {}", e);
                if shutdown.is_raised() {
                    return Err(SensorError::Cancelled(Box::new(e)));
                }
                if let Err(reset_err) = sensor.reset().await {
                    warn!("Particulate sensor reset failed: {}", reset_err);
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

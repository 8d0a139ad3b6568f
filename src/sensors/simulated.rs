//! Simulated sensor board for hosts without the Enviro hardware.
//!
//! Values drift slowly around plausible indoor conditions so the dashboard,
//! the daily logs and the display tolerance bands all have something to show.

use crate::error::SensorError;
use crate::sensors::drivers::{
    EnvironmentSensor, GasResistances, GasSensor, LightSensor, NoiseProfile, NoiseSensor,
    ParticulateFrame, ParticulateSensor, ReferenceThermometer,
};
use crate::sensors::sampler::SensorDrivers;
use async_trait::async_trait;

/// A full simulated driver set, gas and particulate included.
pub fn drivers() -> SensorDrivers {
    SensorDrivers {
        environment: Box::new(SimulatedEnvironment::default()),
        reference: Box::new(SimulatedCpu::default()),
        light: Box::new(SimulatedLight::default()),
        noise: Box::new(SimulatedNoise::default()),
        gas: Some(Box::new(SimulatedGas::default())),
        particulate: Some(Box::new(SimulatedParticulates::default())),
    }
}

/// Triangle wave in `[-1, 1]` with the given period in ticks.
fn wave(tick: u64, period: u64) -> f64 {
    let phase = (tick % period) as f64 / period as f64;
    if phase < 0.5 {
        4.0 * phase - 1.0
    } else {
        3.0 - 4.0 * phase
    }
}

#[derive(Debug, Default)]
pub struct SimulatedEnvironment {
    tick: u64,
}

#[async_trait]
impl EnvironmentSensor for SimulatedEnvironment {
    async fn temperature(&mut self) -> Result<f64, SensorError> {
        self.tick += 1;
        Ok(26.0 + 1.5 * wave(self.tick, 240))
    }

    async fn humidity(&mut self) -> Result<f64, SensorError> {
        Ok(30.0 + 3.0 * wave(self.tick, 360))
    }

    async fn pressure(&mut self) -> Result<f64, SensorError> {
        Ok(1012.0 + 2.0 * wave(self.tick, 900))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedCpu {
    tick: u64,
}

#[async_trait]
impl ReferenceThermometer for SimulatedCpu {
    async fn temperature(&mut self) -> Result<f64, SensorError> {
        self.tick += 1;
        Ok(48.0 + 4.0 * wave(self.tick, 60))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedLight {
    tick: u64,
}

#[async_trait]
impl LightSensor for SimulatedLight {
    async fn lux(&mut self) -> Result<f64, SensorError> {
        self.tick += 1;
        Ok(180.0 + 120.0 * wave(self.tick, 1800))
    }
}

/// Light sensor that never answers.
#[derive(Debug, Default)]
pub struct FailingLight;

#[async_trait]
impl LightSensor for FailingLight {
    async fn lux(&mut self) -> Result<f64, SensorError> {
        Err(SensorError::Light("no response on I2C bus".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedNoise {
    tick: u64,
}

#[async_trait]
impl NoiseSensor for SimulatedNoise {
    async fn noise_profile(&mut self) -> Result<NoiseProfile, SensorError> {
        self.tick += 1;
        let swing = 0.5 + 0.5 * wave(self.tick, 30);
        Ok(NoiseProfile {
            low: 0.02 + 0.01 * swing,
            mid: 0.015 + 0.01 * swing,
            high: 0.01 + 0.005 * swing,
            amp: 0.03 + 0.02 * swing,
        })
    }
}

#[derive(Debug, Default)]
pub struct SimulatedGas {
    tick: u64,
}

#[async_trait]
impl GasSensor for SimulatedGas {
    async fn read_all(&mut self) -> Result<GasResistances, SensorError> {
        self.tick += 1;
        let drift = wave(self.tick, 600);
        Ok(GasResistances {
            oxidising: 20_000.0 + 2_000.0 * drift,
            reducing: 350_000.0 - 20_000.0 * drift,
            nh3: 120_000.0 + 5_000.0 * drift,
        })
    }
}

#[derive(Debug, Default)]
pub struct SimulatedParticulates {
    tick: u64,
}

#[async_trait]
impl ParticulateSensor for SimulatedParticulates {
    async fn read(&mut self) -> Result<ParticulateFrame, SensorError> {
        self.tick += 1;
        let level = (3.0 + 2.0 * wave(self.tick, 120)).round() as u16;
        Ok(ParticulateFrame {
            pm1_0: level,
            pm2_5: level + 2,
            pm10: level + 3,
        })
    }

    async fn reset(&mut self) -> Result<(), SensorError> {
        self.tick = 0;
        Ok(())
    }
}

//! # enviro_web - Enviro sensor board logger
//!
//! Samples an Enviro/Enviro+ sensor board on a Raspberry Pi, keeps the latest
//! reading in memory, persists a reading every few minutes to one JSON file per
//! day and answers day/week/month/year history queries over HTTP.
//!
//! ## Features
//!
//! - **Sampling**: temperature (CPU compensated), humidity, pressure, light,
//!   noise, and optionally gas, particulates and wind from OpenWeather
//! - **Daily logs**: `<YYYY-MM-DD>.json` arrays written atomically
//! - **History**: range queries downsampled to at most 192 points
//! - **Fan and display**: PWM fan on a GPIO pin (feature-gated) and a
//!   trend-coloured display of the current values
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enviro_web::{sensors::simulated, EnviroConfig, SensorArray, Shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EnviroConfig::default();
//!     let mut sensors = SensorArray::from_config(&config, simulated::drivers(), None);
//!     let reading = sensors.sample(&Shutdown::new()).await?;
//!     println!("{}", serde_json::to_string_pretty(&reading)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod hardware;
pub mod scheduler;
pub mod sensors;
pub mod shutdown;
pub mod snapshot;
pub mod storage;
pub mod units;
pub mod weather;
pub mod web;

// Re-export public API
pub use config::EnviroConfig;
pub use error::{EnviroError, Result, SensorError, WeatherFetchError};
pub use scheduler::{PersistSchedule, Scheduler, SchedulerHandle};
pub use sensors::{Reading, SensorArray, SensorDrivers};
pub use shutdown::Shutdown;
pub use snapshot::ReadingSnapshot;
pub use storage::{PersistenceStore, QueryEngine, RangeSelector};
pub use units::UnitSystem;
pub use weather::{OpenWeatherClient, WeatherCache};
pub use web::{start_web_server, AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;

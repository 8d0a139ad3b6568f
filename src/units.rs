//! Unit systems and sample-time conversions.
//!
//! Every conversion happens when a reading is taken, so stored logs and the
//! live snapshot are always in the configured system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// hPa to inches of mercury.
pub const HPA_TO_INHG: f64 = 0.02953;

/// m/s to km/h.
pub const MS_TO_KMH: f64 = 3.6;

/// Measurement system used for every reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(self) -> bool {
        matches!(self, UnitSystem::Metric)
    }

    /// Query parameter value understood by the weather upstream.
    pub fn as_query_value(self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    /// Convert a Celsius temperature into this system.
    pub fn temperature(self, celsius: f64) -> f64 {
        match self {
            UnitSystem::Metric => celsius,
            UnitSystem::Imperial => celsius * 1.8 + 32.0,
        }
    }

    /// Convert an hPa pressure into this system.
    pub fn pressure(self, hpa: f64) -> f64 {
        match self {
            UnitSystem::Metric => hpa,
            UnitSystem::Imperial => hpa * HPA_TO_INHG,
        }
    }

    /// Decimal places kept for pressure.
    pub fn pressure_precision(self) -> u32 {
        match self {
            UnitSystem::Metric => 1,
            UnitSystem::Imperial => 2,
        }
    }

    /// Wind speed as reported by the upstream, converted for display.
    ///
    /// The upstream already answers in mph for imperial requests, so only the
    /// metric m/s value needs converting.
    pub fn wind_speed(self, upstream: f64) -> f64 {
        match self {
            UnitSystem::Metric => round_to(upstream * MS_TO_KMH, 1),
            UnitSystem::Imperial => upstream,
        }
    }

    pub fn temperature_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "°C",
            UnitSystem::Imperial => "°F",
        }
    }

    pub fn pressure_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "hPa",
            UnitSystem::Imperial => "inHg",
        }
    }

    pub fn wind_speed_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "km/h",
            UnitSystem::Imperial => "mph",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).round() / scale
}

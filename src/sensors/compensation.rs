//! Bias correction for the environment sensor.

use crate::config::CompensationConfig;
use std::collections::VecDeque;

/// Samples in the reference-temperature moving average.
pub const REFERENCE_WINDOW: usize = 5;

/// Temperature correction mode; exactly one is active per run.
#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureCompensation {
    /// `raw - (avg_ref - raw) / factor` over a rolling window of reference readings.
    ReferenceAverage {
        factor: f64,
        window: VecDeque<f64>,
    },
    /// `raw * factor`.
    Scale { factor: f64 },
}

impl TemperatureCompensation {
    pub fn from_config(config: &CompensationConfig) -> Self {
        if config.temp_cpu_compensation {
            Self::ReferenceAverage {
                factor: config.temp_factor,
                window: VecDeque::with_capacity(REFERENCE_WINDOW),
            }
        } else {
            Self::Scale {
                factor: config.temp_factor,
            }
        }
    }

    pub fn needs_reference(&self) -> bool {
        matches!(self, Self::ReferenceAverage { .. })
    }

    /// Correct a raw Celsius temperature.
    ///
    /// The first reference value seeds the whole window. A missing reference
    /// leaves the window untouched and corrects against its current average.
    pub fn apply(&mut self, raw: f64, reference: Option<f64>) -> f64 {
        match self {
            Self::Scale { factor } => raw * *factor,
            Self::ReferenceAverage { factor, window } => {
                if let Some(reference) = reference {
                    if window.is_empty() {
                        window.extend(std::iter::repeat(reference).take(REFERENCE_WINDOW));
                    } else {
                        window.pop_front();
                        window.push_back(reference);
                    }
                }
                if window.is_empty() {
                    return raw;
                }
                let average = window.iter().sum::<f64>() / window.len() as f64;
                raw - (average - raw) / *factor
            }
        }
    }
}

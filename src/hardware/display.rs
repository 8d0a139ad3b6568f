//! Local display of the current readings.
//!
//! Each metric is coloured by how it moved since the previous reading:
//! above, below, or within a 1% tolerance band.

use crate::error::Result;
use crate::sensors::reading::{keys, Reading};
use crate::units::UnitSystem;
use serde::Serialize;
use tracing::debug;

/// Ratio a value must move by to count as above or below.
pub const TOLERANCE: f64 = 1.01;

/// Columns used for the cell grid.
pub const COLUMNS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Above,
    Below,
    Within,
}

impl Trend {
    /// RGB colour used on the LCD.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Trend::Above => (255, 0, 128),
            Trend::Below => (64, 220, 220),
            Trend::Within => (64, 220, 64),
        }
    }
}

/// Classify `new` against `old` using [`TOLERANCE`].
pub fn trend(new: f64, old: f64) -> Trend {
    if new > old * TOLERANCE {
        Trend::Above
    } else if new < old / TOLERANCE {
        Trend::Below
    } else {
        Trend::Within
    }
}

/// One positioned metric on the display grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayCell {
    pub key: String,
    pub value: f64,
    pub unit: &'static str,
    pub trend: Trend,
    pub column: usize,
    pub row: usize,
}

impl DisplayCell {
    /// Text drawn for the cell, e.g. `temp: 21.4 °C`.
    pub fn message(&self) -> String {
        let label: String = self.key.chars().take(4).collect();
        format!("{}: {} {}", label, self.value, self.unit)
    }
}

/// Display unit for a metric key; `None` for keys that are not displayed.
pub fn unit_for(key: &str, units: UnitSystem) -> Option<&'static str> {
    match key {
        keys::TEMPERATURE => Some(units.temperature_label()),
        keys::HUMIDITY => Some("%"),
        keys::PRESSURE => Some(units.pressure_label()),
        keys::LIGHT => Some("Lux"),
        keys::NOISE_LOW | keys::NOISE_MID | keys::NOISE_HIGH | keys::NOISE_AMP => Some("u"),
        keys::WIND_DIRECTION => Some("°"),
        keys::WIND_SPEED => Some(units.wind_speed_label()),
        keys::OXIDISING | keys::REDUCING | keys::NH3 => Some("kΩ"),
        keys::PM1 | keys::PM25 | keys::PM10 => Some("μg/m3"),
        _ => None,
    }
}

/// Lay out the displayable metrics of `current` in a column-major grid.
///
/// Grid slots are assigned to every displayable key so positions stay stable;
/// a key absent on either side gets no cell.
pub fn layout(current: &Reading, previous: &Reading, units: UnitSystem) -> Vec<DisplayCell> {
    let displayable: Vec<(&str, Option<f64>, &'static str)> = current
        .iter()
        .filter_map(|(key, value)| unit_for(key, units).map(|unit| (key, value, unit)))
        .collect();
    let rows = displayable.len().div_ceil(COLUMNS).max(1);

    displayable
        .into_iter()
        .enumerate()
        .filter_map(|(i, (key, value, unit))| {
            let new = value?;
            let old = previous.get(key).flatten()?;
            Some(DisplayCell {
                key: key.to_string(),
                value: new,
                unit,
                trend: trend(new, old),
                column: i / rows,
                row: i % rows,
            })
        })
        .collect()
}

/// Output device for laid-out cells.
pub trait ReadingDisplay: Send {
    fn render(&mut self, cells: &[DisplayCell]) -> Result<()>;
    fn set_backlight(&mut self, on: bool) -> Result<()>;
}

/// Display that writes each cell to the log.
#[derive(Debug, Default)]
pub struct LogDisplay {
    backlight: bool,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self { backlight: true }
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }
}

impl ReadingDisplay for LogDisplay {
    fn render(&mut self, cells: &[DisplayCell]) -> Result<()> {
        for cell in cells {
            debug!(
                "display[{},{}] {} ({:?})",
                cell.column,
                cell.row,
                cell.message(),
                cell.trend
            );
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.backlight = on;
        Ok(())
    }
}

/// Display collaborator driven by the scheduler.
pub struct DisplayPanel {
    display: Box<dyn ReadingDisplay>,
    units: UnitSystem,
}

impl DisplayPanel {
    pub fn new(display: Box<dyn ReadingDisplay>, units: UnitSystem) -> Self {
        Self { display, units }
    }

    /// Render `current` coloured against `previous`.
    pub fn show(&mut self, current: &Reading, previous: &Reading) -> Result<()> {
        let cells = layout(current, previous, self.units);
        self.display.render(&cells)
    }

    /// Turn the backlight off before the process exits.
    pub fn power_off(&mut self) -> Result<()> {
        self.display.set_backlight(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::reading::parse_time;

    fn reading(temp: Option<f64>, humi: Option<f64>) -> Reading {
        Reading::new(parse_time("Mon Jan 01 00:00:00 2024").unwrap())
            .with(keys::TEMPERATURE, temp)
            .with(keys::HUMIDITY, humi)
            .with(keys::PRESSURE, Some(1000.0))
    }

    #[test]
    fn test_trend_tolerance_band() {
        assert_eq!(trend(102.0, 100.0), Trend::Above);
        assert_eq!(trend(101.0, 100.0), Trend::Within);
        assert_eq!(trend(99.5, 100.0), Trend::Within);
        assert_eq!(trend(98.0, 100.0), Trend::Below);
    }

    #[test]
    fn test_layout_skips_absent_values() {
        let current = reading(Some(21.0), None);
        let previous = reading(None, Some(40.0));
        let cells = layout(&current, &previous, UnitSystem::Metric);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].key, keys::PRESSURE);
        assert_eq!(cells[0].trend, Trend::Within);
    }

    #[test]
    fn test_layout_is_column_major() {
        let current = reading(Some(25.0), Some(40.0));
        let previous = reading(Some(20.0), Some(50.0));
        let cells = layout(&current, &previous, UnitSystem::Imperial);
        // three cells, two rows per column
        assert_eq!((cells[0].column, cells[0].row), (0, 0));
        assert_eq!((cells[1].column, cells[1].row), (0, 1));
        assert_eq!((cells[2].column, cells[2].row), (1, 0));
        assert_eq!(cells[0].trend, Trend::Above);
        assert_eq!(cells[1].trend, Trend::Below);
        assert_eq!(cells[0].message(), "temp: 25 °F");
        assert_eq!(cells[2].unit, "inHg");
    }

    #[test]
    fn test_panel_power_off() {
        let mut panel = DisplayPanel::new(Box::new(LogDisplay::new()), UnitSystem::Metric);
        let current = reading(Some(21.0), Some(40.0));
        panel.show(&current, &current).unwrap();
        panel.power_off().unwrap();
    }
}

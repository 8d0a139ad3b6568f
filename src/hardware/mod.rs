//! Actuators attached to the sensor board: the fan and the local display.

pub mod display;
pub mod fan;

pub use display::{DisplayCell, DisplayPanel, LogDisplay, ReadingDisplay, Trend};
pub use fan::{open_fan, parse_duty, FanControl, RecordingFan, SharedFan};

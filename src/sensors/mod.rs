//! Sensor sampling: drivers, compensation and reading composition.
//!
//! Each sample produces a [`Reading`] whose key set is fixed for the life of
//! the process; disabled sensors never contribute keys and failed reads show
//! up as absent values.

pub mod compensation;
pub mod drivers;
pub mod reading;
pub mod sampler;
pub mod simulated;

// Re-export commonly used items
pub use reading::Reading;
pub use sampler::{read_particulates, SensorArray, SensorDrivers};

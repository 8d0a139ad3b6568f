//! Fan duty-cycle control on a GPIO pin.
//!
//! The real PWM output is feature-gated so the crate builds on hosts without
//! Raspberry Pi peripherals; without the `gpio` feature a recording fan
//! stands in.

use crate::error::{EnviroError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Software PWM frequency for the fan output.
pub const FAN_PWM_HZ: f64 = 1000.0;

/// Fan handle shared between the HTTP layer and shutdown.
pub type SharedFan = Arc<Mutex<Box<dyn FanControl>>>;

/// Trait for fan actuation.
pub trait FanControl: Send {
    /// Set the duty cycle in percent (0-100).
    fn set_duty_cycle(&mut self, percent: u8) -> Result<()>;

    /// Last duty cycle applied.
    fn duty_cycle(&self) -> u8;

    /// Stop driving the pin and hand it back to the system.
    fn release(&mut self) -> Result<()>;
}

/// Parse a requested duty cycle; anything outside 0-100 is rejected.
pub fn parse_duty(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|percent| *percent <= 100)
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use rppal::gpio::{Gpio, OutputPin};

    /// Fan driven by rppal software PWM.
    pub struct GpioFan {
        pin: OutputPin,
        duty: u8,
    }

    impl GpioFan {
        /// Claim `pin` as an output and start the fan at full speed.
        pub fn new(pin: u8) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                EnviroError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            let pin = gpio
                .get(pin)
                .map_err(|e| EnviroError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_output();

            let mut fan = Self { pin, duty: 0 };
            fan.set_duty_cycle(100)?;
            Ok(fan)
        }
    }

    impl FanControl for GpioFan {
        fn set_duty_cycle(&mut self, percent: u8) -> Result<()> {
            if percent > 100 {
                return Err(EnviroError::gpio_error(format!(
                    "duty cycle {} out of range",
                    percent
                )));
            }
            self.pin
                .set_pwm_frequency(FAN_PWM_HZ, f64::from(percent) / 100.0)
                .map_err(|e| EnviroError::gpio_error(format!("Failed to set PWM: {}", e)))?;
            self.duty = percent;
            Ok(())
        }

        fn duty_cycle(&self) -> u8 {
            self.duty
        }

        fn release(&mut self) -> Result<()> {
            self.pin
                .clear_pwm()
                .map_err(|e| EnviroError::gpio_error(format!("Failed to clear PWM: {}", e)))?;
            self.pin.set_low();
            Ok(())
        }
    }
}

/// Fan that only records what it was asked to do.
#[derive(Debug)]
pub struct RecordingFan {
    duty: u8,
    released: bool,
}

impl RecordingFan {
    pub fn new() -> Self {
        Self {
            duty: 100,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Default for RecordingFan {
    fn default() -> Self {
        Self::new()
    }
}

impl FanControl for RecordingFan {
    fn set_duty_cycle(&mut self, percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(EnviroError::gpio_error(format!(
                "duty cycle {} out of range",
                percent
            )));
        }
        self.duty = percent;
        Ok(())
    }

    fn duty_cycle(&self) -> u8 {
        self.duty
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

/// Open the fan on `pin` using the best available backend.
pub fn open_fan(pin: u8) -> Result<Box<dyn FanControl>> {
    #[cfg(feature = "gpio")]
    {
        Ok(Box::new(raspberry_pi::GpioFan::new(pin)?))
    }

    #[cfg(not(feature = "gpio"))]
    {
        tracing::warn!(
            "GPIO support not compiled in, fan on pin {} is simulated",
            pin
        );
        Ok(Box::new(RecordingFan::new()))
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::GpioFan;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duty() {
        assert_eq!(parse_duty("0"), Some(0));
        assert_eq!(parse_duty(" 55 "), Some(55));
        assert_eq!(parse_duty("100"), Some(100));
        assert_eq!(parse_duty("101"), None);
        assert_eq!(parse_duty("-1"), None);
        assert_eq!(parse_duty(""), None);
        assert_eq!(parse_duty("fast"), None);
    }

    #[test]
    fn test_recording_fan() {
        let mut fan = RecordingFan::new();
        assert_eq!(fan.duty_cycle(), 100);
        fan.set_duty_cycle(40).unwrap();
        assert_eq!(fan.duty_cycle(), 40);
        assert!(fan.set_duty_cycle(150).is_err());
        fan.release().unwrap();
        assert!(fan.is_released());
    }
}

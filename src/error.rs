//! Error handling for the enviro_web crate.

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for enviro_web operations.
pub type Result<T> = std::result::Result<T, EnviroError>;

/// The main error type for sampling, persistence and serving.
#[derive(Debug, thiserror::Error)]
pub enum EnviroError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A sensor could not be read
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Daily log storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fan or display actuation failed
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// The background sampling task ended abnormally
    #[error("Background task error: {0}")]
    Background(String),
}

impl EnviroError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }
}

/// Per-category sensor failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("environment sensor: {0}")]
    Environment(String),

    #[error("reference thermometer: {0}")]
    Reference(String),

    #[error("light sensor: {0}")]
    Light(String),

    #[error("noise sensor: {0}")]
    Noise(String),

    #[error("gas sensor: {0}")]
    Gas(String),

    /// A malformed or short frame from the particulate sensor.
    #[error("particulate sensor ({kind}): {message}")]
    Particulate { kind: ParticulateFault, message: String },

    /// The particulate retry loop observed shutdown and gave up.
    #[error("particulate read abandoned during shutdown: {0}")]
    Cancelled(Box<SensorError>),
}

impl SensorError {
    pub fn particulate(kind: ParticulateFault, message: impl Into<String>) -> Self {
        Self::Particulate {
            kind,
            message: message.into(),
        }
    }
}

/// Kind of particulate frame fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticulateFault {
    /// Frame did not start with the expected header or failed its checksum
    Malformed,
    /// Fewer bytes than a full frame were available
    ShortRead,
}

impl std::fmt::Display for ParticulateFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticulateFault::Malformed => write!(f, "malformed frame"),
            ParticulateFault::ShortRead => write!(f, "short read"),
        }
    }
}

/// Classified failure of the external weather request.
///
/// This is a value, not a propagated error: it is cached like a successful
/// payload and consumers read it as "no data".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WeatherFetchError {
    #[error("The request timed out. Please try again later")]
    Timeout,

    #[error("Unable to connect to the weather API. Check your network connection")]
    Connection,

    #[error("Received error code {0}")]
    Status(u16),

    #[error("An unexpected error occurred: {0}")]
    Transport(String),
}

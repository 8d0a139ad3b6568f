//! HTTP server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the web server, read from the `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to send permissive CORS headers
    pub enable_cors: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: false,
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = WebConfig::default()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_cors(true);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.enable_cors);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: WebConfig = toml::from_str("port = 8181").unwrap();
        assert_eq!(config.port, 8181);
        assert_eq!(config.host, "0.0.0.0");
    }
}

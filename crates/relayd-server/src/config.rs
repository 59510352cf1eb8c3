//! Daemon configuration.
//!
//! Loaded from a JSON file; every section has working defaults so a missing
//! file yields a runnable relay-only setup (two slots, four channels, no
//! hardware, no auth). Listen address can be overridden by the
//! `RELAYD_HOST` / `RELAYD_PORT` environment variables and by CLI flags,
//! in that order.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub gpio: GpioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Device slot count.
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Channels per slot, numbered `1..=channels` on the wire.
    #[serde(default = "default_channels")]
    pub channels: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Shared token required at WebSocket upgrade. `None` disables the gate.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpioConfig {
    /// Drive local sysfs GPIO lines instead of relying on device peers.
    #[serde(default)]
    pub enabled: bool,

    /// Channel number to sysfs GPIO line.
    #[serde(default = "default_lines")]
    pub lines: BTreeMap<u8, u32>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_slots() -> usize {
    2
}

fn default_channels() -> u8 {
    4
}

fn default_lines() -> BTreeMap<u8, u32> {
    // Line numbers for the relay hat this daemon was originally deployed on
    BTreeMap::from([(1, 456), (2, 488)])
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            channels: default_channels(),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lines: default_lines(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the parsed values fail validation.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply listen-address overrides, strongest last: config file values,
    /// then environment, then CLI flags.
    pub fn apply_overrides(
        &mut self,
        env_host: Option<String>,
        env_port: Option<u16>,
        cli_host: Option<String>,
        cli_port: Option<u16>,
    ) {
        if let Some(host) = env_host {
            self.server.host = host;
        }
        if let Some(port) = env_port {
            self.server.port = port;
        }
        if let Some(host) = cli_host {
            self.server.host = host;
        }
        if let Some(port) = cli_port {
            self.server.port = port;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.relay.slots == 0 {
            return Err(ServerError::Config(
                "relay.slots must be at least 1".to_string(),
            ));
        }
        if self.relay.channels == 0 {
            return Err(ServerError::Config(
                "relay.channels must be at least 1".to_string(),
            ));
        }
        if let Some(channel) = self
            .gpio
            .lines
            .keys()
            .find(|channel| **channel == 0 || **channel > self.relay.channels)
        {
            return Err(ServerError::Config(format!(
                "gpio.lines maps channel {channel} outside 1..={}",
                self.relay.channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.relay.slots, 2);
        assert_eq!(config.relay.channels, 4);
        assert_eq!(config.auth.token, None);
        assert!(!config.gpio.enabled);
        assert_eq!(config.gpio.lines.get(&1), Some(&456));
        assert_eq!(config.gpio.lines.get(&2), Some(&488));
    }

    #[test]
    fn test_parse_full_file() {
        let json = r#"{
            "server": { "host": "127.0.0.1", "port": 8080 },
            "relay": { "slots": 4, "channels": 8 },
            "auth": { "token": "hunter2" },
            "gpio": { "enabled": true, "lines": { "1": 456 } }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.relay.slots, 4);
        assert_eq!(config.relay.channels, 8);
        assert_eq!(config.auth.token.as_deref(), Some("hunter2"));
        assert!(config.gpio.enabled);
        assert_eq!(config.gpio.lines.len(), 1);
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let json = r#"{ "server": { "port": 9000 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.relay.slots, 2);
    }

    #[test]
    fn test_overrides_strongest_last() {
        let mut config = Config::default();
        config.apply_overrides(
            Some("10.0.0.1".to_string()),
            Some(4000),
            Some("10.0.0.2".to_string()),
            None,
        );
        assert_eq!(config.server.host, "10.0.0.2", "CLI beats environment");
        assert_eq!(config.server.port, 4000, "environment beats file");
    }

    #[test]
    fn test_validate_rejects_zero_slots() {
        let json = r#"{ "relay": { "slots": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_gpio_channel() {
        let json = r#"{ "relay": { "channels": 2 }, "gpio": { "lines": { "3": 460 } } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("channel 3"));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/relayd.json")).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}

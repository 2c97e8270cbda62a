//! Configuration structures for the Modbus TCP slave.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for deployment on a device.

use crate::error::{SlaveError, SlaveResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Well-known Modbus TCP port.
pub const MODBUS_TCP_PORT: u16 = 502;

/// Top-level slave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    /// Unit identifier this slave answers to.
    pub unit_id: u8,

    /// Listener configuration.
    pub listen: ListenConfig,

    /// Sleep between polls when no request was answered.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Socket write timeout used when transmitting a response.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Drop requests whose protocol id is non-zero or whose MBAP length
    /// field disagrees with the number of bytes received.
    pub strict_mbap: bool,

    /// Sizes of the in-memory register bank served by the daemon.
    pub bank: BankConfig,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            unit_id: 1,
            listen: ListenConfig::default(),
            poll_interval: Duration::from_millis(1),
            write_timeout: Duration::from_secs(1),
            strict_mbap: false,
            bank: BankConfig::default(),
        }
    }
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Address to bind (e.g., "0.0.0.0" or "127.0.0.1").
    pub address: IpAddr,

    /// TCP port, 502 per the Modbus TCP standard.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: MODBUS_TCP_PORT,
        }
    }
}

impl ListenConfig {
    /// Socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Register bank sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Number of coils (read/write bits).
    pub coils: u16,
    /// Number of discrete inputs (read-only bits).
    pub discrete_inputs: u16,
    /// Number of holding registers (read/write words).
    pub holding_registers: u16,
    /// Number of input registers (read-only words).
    pub input_registers: u16,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            coils: 256,
            discrete_inputs: 256,
            holding_registers: 256,
            input_registers: 256,
        }
    }
}

impl SlaveConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        debug!(?path, "Reading slave configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Check values that would only fail once the slave is running.
    ///
    /// # Errors
    ///
    /// Returns [`SlaveError::Config`] for the broadcast unit id, a zero
    /// write timeout (sockets reject it) or a bank with no data points.
    pub fn validate(&self) -> SlaveResult<()> {
        if self.unit_id == 0 {
            return Err(SlaveError::Config(
                "unit_id 0 is the broadcast address and cannot be served".into(),
            ));
        }
        if self.write_timeout.is_zero() {
            return Err(SlaveError::Config("write_timeout must be non-zero".into()));
        }
        let bank = &self.bank;
        if bank.coils == 0
            && bank.discrete_inputs == 0
            && bank.holding_registers == 0
            && bank.input_registers == 0
        {
            return Err(SlaveError::Config(
                "register bank must hold at least one data point".into(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

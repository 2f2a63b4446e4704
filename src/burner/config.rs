//! Burner connection settings

use crate::error::{D64Error, Result};
use std::env;
use std::time::Duration;

/// Environment variable naming the programmer port
pub const PORT_ENV: &str = "D64_BURNER_PORT";

/// Environment variable overriding the acknowledge timeout, in milliseconds
pub const TIMEOUT_ENV: &str = "D64_BURNER_TIMEOUT_MS";

/// Default acknowledge timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default interval between data-available polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: u8,
}

impl Default for LineSettings {
    /// 19200 baud, 8N1
    fn default() -> Self {
        Self {
            baud_rate: 19_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl std::fmt::Display for LineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

/// Settings for talking to the programmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnerConfig {
    /// Port identifier handed to the transport
    pub port: String,
    /// How long to wait for any single response
    pub timeout: Duration,
    /// Sleep between data-available polls
    pub poll_interval: Duration,
    /// Serial line configuration
    pub line: LineSettings,
}

impl BurnerConfig {
    /// Default settings for a port
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            line: LineSettings::default(),
        }
    }

    /// Set the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Read `D64_BURNER_PORT` and `D64_BURNER_TIMEOUT_MS` over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var(PORT_ENV) {
            config.port = port;
        }
        if let Ok(value) = env::var(TIMEOUT_ENV) {
            let millis: u64 = value.trim().parse().map_err(|_| {
                D64Error::configuration(format!("{} is not a number: '{}'", TIMEOUT_ENV, value))
            })?;
            config.timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

impl Default for BurnerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:6400")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BurnerConfig::new("ttyUSB0");
        assert_eq!(config.port, "ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.line.to_string(), "19200 8N1");
    }

    #[test]
    fn test_builder() {
        let config = BurnerConfig::default()
            .with_timeout(Duration::from_millis(50))
            .with_poll_interval(Duration::ZERO);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.poll_interval, Duration::ZERO);
    }

    // Both variables are touched in one test so parallel tests do not race
    #[test]
    fn test_from_env() {
        env::set_var(PORT_ENV, "10.0.0.2:4000");
        env::set_var(TIMEOUT_ENV, "250");
        let config = BurnerConfig::from_env().unwrap();
        assert_eq!(config.port, "10.0.0.2:4000");
        assert_eq!(config.timeout, Duration::from_millis(250));

        env::set_var(TIMEOUT_ENV, "soon");
        assert!(matches!(
            BurnerConfig::from_env(),
            Err(D64Error::Configuration(_))
        ));

        env::remove_var(PORT_ENV);
        env::remove_var(TIMEOUT_ENV);
    }
}

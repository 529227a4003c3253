//! Streaming configuration.

use crate::error::{Result, SystemError};
use crate::serial::discovery::DEFAULT_KEYWORDS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for discovery, connection and the transmission loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Serial device path; `None` runs port discovery
    pub port: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Delay between transmitted lines in milliseconds
    pub interval_ms: u64,
    /// Delay after opening the port before the first write
    pub settle_delay_ms: u64,
    /// Pause after a failed iteration in milliseconds
    pub error_pause_ms: u64,
    /// Serial read/write timeout in milliseconds
    pub serial_timeout_ms: u64,
    /// Substrings that identify the target device during discovery
    pub keywords: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: crate::DEFAULT_BAUD_RATE,
            interval_ms: crate::DEFAULT_INTERVAL_MS,
            settle_delay_ms: crate::DEFAULT_SETTLE_DELAY_MS,
            error_pause_ms: crate::DEFAULT_ERROR_PAUSE_MS,
            serial_timeout_ms: crate::DEFAULT_SERIAL_TIMEOUT_MS,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl StreamConfig {
    /// Set an explicit serial port, skipping discovery.
    pub fn with_port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the transmission interval.
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the post-connect settle delay.
    pub fn with_settle_delay(mut self, settle_delay_ms: u64) -> Self {
        self.settle_delay_ms = settle_delay_ms;
        self
    }

    /// Set the pause applied after a failed iteration.
    pub fn with_error_pause(mut self, error_pause_ms: u64) -> Self {
        self.error_pause_ms = error_pause_ms;
        self
    }

    /// Replace the discovery keywords.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Reject values that would stall or break the link.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(SystemError::config_error("baud rate must be greater than 0"));
        }
        if self.interval_ms == 0 {
            return Err(SystemError::config_error("interval must be greater than 0 ms"));
        }
        if self.port.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(SystemError::config_error("port path is empty"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_timeout_ms)
    }
}

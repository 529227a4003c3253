//! The write side of the serial connection.

use crate::config::StreamConfig;
use crate::error::{Result, SystemError};
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Destination for formatted sample lines.
///
/// `close` takes the sink by value, so a sink can only ever be closed once.
pub trait LineSink {
    /// Write one complete line, including its trailing newline.
    fn write_line(&mut self, line: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Flush and release the underlying device.
    fn close(self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// An open serial port to the display board.
pub struct SerialLink {
    port: String,
    stream: SerialStream,
}

impl SerialLink {
    /// Open `port` with the configured baud rate and timeout.
    ///
    /// Opening the port resets most ESP32 boards, so this waits for the
    /// configured settle delay before returning.
    pub async fn open(port: &str, config: &StreamConfig) -> Result<Self> {
        let builder = tokio_serial::new(port, config.baud_rate).timeout(config.serial_timeout());
        let stream = SerialStream::open(&builder)
            .map_err(|e| SystemError::connection_error(port, e))?;

        info!(port, baud = config.baud_rate, "serial port opened");
        debug!(delay_ms = config.settle_delay_ms, "waiting for board to reset");
        tokio::time::sleep(config.settle_delay()).await;

        Ok(Self {
            port: port.to_string(),
            stream,
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl LineSink for SerialLink {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        debug!(port = %self.port, "serial port closed");
        Ok(())
    }
}

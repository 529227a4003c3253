//! # pc_meter - Host Metrics over Serial
//!
//! Samples host system metrics and streams them, one line at a time, to a
//! microcontroller attached over a USB serial adapter (ESP32, CH340, CP210x,
//! FTDI and friends) for display.
//!
//! ## Features
//!
//! - **Metric collection**: CPU usage, RAM usage, disk usage, CPU temperature, GPU load
//! - **Sensor fallbacks**: each metric tries several sources before reporting `-1`
//! - **Port discovery**: guesses the device port from USB descriptors
//! - **Library + Binary**: Use as a crate or standalone application
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pc_meter::{run, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stats = run(StreamConfig::default()).await?;
//!     println!("sent {} lines", stats.lines_sent);
//!     Ok(())
//! }
//! ```
//!
//! ## Wire format
//!
//! Each line is `cpu,ram,disk,temp,gpu\n` with one decimal per field, for
//! example `12.3,56.7,40.1,48.0,0.0\n`. Unavailable metrics are sent as `0.0`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod serial;
pub mod streamer;

// Re-export public API
pub use config::StreamConfig;
pub use error::{Result, SystemError};
pub use metrics::{
    collector::SystemCollector,
    data::{Sample, UNAVAILABLE},
    traits::MetricsProvider,
};
pub use serial::{discovery::PortDescriptor, link::LineSink, link::SerialLink};
pub use streamer::{run, LinkState, StreamStats, Streamer};

/// Default serial baud rate expected by the display firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// The default interval between transmitted lines in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// How long to wait after opening the port for the board to finish resetting
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Pause after a failed loop iteration before trying again
pub const DEFAULT_ERROR_PAUSE_MS: u64 = 1_000;

/// Serial read/write timeout in milliseconds
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 1_000;

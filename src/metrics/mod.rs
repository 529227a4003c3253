//! Host metrics collection and data structures.
//!
//! This module collects the five metrics shown on the display: CPU usage,
//! RAM usage, disk usage, CPU temperature and GPU load. Metrics backed by
//! optional hardware are read through ordered probe chains.

pub mod collector;
pub mod command;
pub mod data;
pub mod disk;
pub mod gpu;
pub mod temperature;
pub mod traits;

// Re-export commonly used items
pub use collector::SystemCollector;
pub use data::{Sample, UNAVAILABLE};
pub use traits::{MetricsProvider, Probe};

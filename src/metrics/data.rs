//! Data structures for collected metrics.

use serde::{Deserialize, Serialize};

/// Sentinel for a metric that could not be obtained.
pub const UNAVAILABLE: f64 = -1.0;

/// One snapshot of the five metrics shown on the display.
///
/// Every field is either a measured value or [`UNAVAILABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp when this sample was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// CPU usage percentage (0.0 to 100.0)
    pub cpu_percent: f64,
    /// RAM usage percentage (0.0 to 100.0)
    pub ram_percent: f64,
    /// Disk usage percentage of the system drive (0.0 to 100.0)
    pub disk_percent: f64,
    /// CPU temperature in Celsius
    pub temp_celsius: f64,
    /// GPU load percentage (0.0 to 100.0)
    pub gpu_percent: f64,
}

impl Sample {
    /// Create a sample stamped with the current time and no readings.
    pub fn new() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            cpu_percent: UNAVAILABLE,
            ram_percent: UNAVAILABLE,
            disk_percent: UNAVAILABLE,
            temp_celsius: UNAVAILABLE,
            gpu_percent: UNAVAILABLE,
        }
    }

    /// Render the sample as one wire line: `cpu,ram,disk,temp,gpu\n`.
    ///
    /// Sentinels are shown as `0.0`; the firmware has no notion of "missing".
    pub fn to_line(&self) -> String {
        format!(
            "{:.1},{:.1},{:.1},{:.1},{:.1}\n",
            display_value(self.cpu_percent),
            display_value(self.ram_percent),
            display_value(self.disk_percent),
            display_value(self.temp_celsius),
            display_value(self.gpu_percent),
        )
    }

    /// Names of the metrics that came back unavailable.
    pub fn unavailable_fields(&self) -> Vec<&'static str> {
        [
            ("cpu", self.cpu_percent),
            ("ram", self.ram_percent),
            ("disk", self.disk_percent),
            ("temp", self.temp_celsius),
            ("gpu", self.gpu_percent),
        ]
        .into_iter()
        .filter(|(_, value)| !is_available(*value))
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a reading holds a real value rather than the sentinel.
pub fn is_available(value: f64) -> bool {
    value >= 0.0
}

/// Clamp a reading for display: negatives, `-0.0` and NaN become zero.
pub fn display_value(value: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Compute `used / total` as a percentage, or the sentinel for an empty total.
pub fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        return UNAVAILABLE;
    }
    ((used as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, ram: f64, disk: f64, temp: f64, gpu: f64) -> Sample {
        Sample {
            timestamp: 0,
            cpu_percent: cpu,
            ram_percent: ram,
            disk_percent: disk,
            temp_celsius: temp,
            gpu_percent: gpu,
        }
    }

    #[test]
    fn test_line_clamps_sentinels() {
        let line = sample(12.34, 56.7, 0.0, -1.0, -1.0).to_line();
        assert_eq!(line, "12.3,56.7,0.0,0.0,0.0\n");
    }

    #[test]
    fn test_line_full_readings() {
        let line = sample(100.0, 3.06, 99.94, 47.26, 8.0).to_line();
        assert_eq!(line, "100.0,3.1,99.9,47.3,8.0\n");
    }

    #[test]
    fn test_nan_is_sent_as_zero() {
        let line = sample(f64::NAN, 1.0, 1.0, 1.0, 1.0).to_line();
        assert!(line.starts_with("0.0,"));
    }

    #[test]
    fn test_new_sample_is_unavailable() {
        let sample = Sample::new();
        assert!(sample.timestamp > 0);
        assert_eq!(sample.unavailable_fields().len(), 5);
        assert_eq!(sample.to_line(), "0.0,0.0,0.0,0.0,0.0\n");
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), UNAVAILABLE);
        assert_eq!(percent_of(50, 200), 25.0);
        assert_eq!(percent_of(300, 200), 100.0);
    }
}

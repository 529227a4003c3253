//! Core metrics collection implementation.

use crate::error::Result;
use crate::metrics::{
    data::{percent_of, Sample, UNAVAILABLE},
    disk::{self, default_candidates},
    gpu, temperature,
    traits::{first_reading, BoxedProbe, MetricsProvider},
};
use std::path::PathBuf;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::time::Instant;
use tracing::debug;

/// Valid range for percentage metrics.
const PERCENT_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// Host metrics collector using sysinfo plus per-platform sensor probes.
pub struct SystemCollector {
    system: System,
    disks: Disks,
    disk_candidates: Vec<PathBuf>,
    temperature_probes: Vec<BoxedProbe>,
    gpu_probes: Vec<BoxedProbe>,
    /// Earliest moment the first CPU reading is meaningful; cleared once waited on.
    cpu_ready_at: Option<Instant>,
}

impl SystemCollector {
    /// Create a collector with the default probes for this platform.
    ///
    /// CPU usage is sampled once here; the first [`collect_sample`] waits
    /// asynchronously until sysinfo's minimum update interval has passed so
    /// that its CPU reading reflects real load instead of zero.
    ///
    /// [`collect_sample`]: MetricsProvider::collect_sample
    pub fn new() -> Result<Self> {
        Ok(Self::with_probes(
            default_candidates(),
            temperature::default_probes(),
            gpu::default_probes(),
        ))
    }

    /// Create a collector with explicit disk candidates and probe chains.
    pub fn with_probes(
        disk_candidates: Vec<PathBuf>,
        temperature_probes: Vec<BoxedProbe>,
        gpu_probes: Vec<BoxedProbe>,
    ) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();

        debug!(
            temperature_probes = ?temperature_probes.iter().map(|p| p.name()).collect::<Vec<_>>(),
            gpu_probes = ?gpu_probes.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "collector initialized"
        );

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            disk_candidates,
            temperature_probes,
            gpu_probes,
            cpu_ready_at: Some(Instant::now() + MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    /// Wait out the CPU priming interval, once.
    async fn wait_for_cpu_baseline(&mut self) {
        if let Some(ready_at) = self.cpu_ready_at.take() {
            tokio::time::sleep_until(ready_at).await;
        }
    }

    /// CPU usage since the previous call, averaged over all cores.
    ///
    /// Called directly right after construction this may read zero; samples
    /// taken through [`MetricsProvider::collect_sample`] wait for a baseline.
    pub fn read_cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        let usage = self.system.global_cpu_usage() as f64;
        if usage.is_finite() {
            usage.clamp(0.0, 100.0)
        } else {
            UNAVAILABLE
        }
    }

    /// Used memory as a share of total memory.
    pub fn read_ram_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        percent_of(self.system.used_memory(), self.system.total_memory())
    }

    /// Usage of the system drive, trying each candidate path in turn.
    pub fn read_disk_percent(&mut self) -> f64 {
        self.disks.refresh();
        let value = disk::disk_percent(&self.disks, &self.disk_candidates);
        if value != UNAVAILABLE {
            return value;
        }

        // Drives may have been mounted since startup.
        self.disks.refresh_list();
        disk::disk_percent(&self.disks, &self.disk_candidates)
    }

    /// CPU temperature in Celsius from the first probe with a valid reading.
    pub fn read_temperature(&mut self) -> f64 {
        first_reading(&mut self.temperature_probes, temperature::PLAUSIBLE_RANGE)
    }

    /// Load of the first GPU as a percentage.
    pub fn read_gpu_percent(&mut self) -> f64 {
        first_reading(&mut self.gpu_probes, PERCENT_RANGE)
    }
}

impl MetricsProvider for SystemCollector {
    async fn collect_sample(&mut self) -> Result<Sample> {
        self.wait_for_cpu_baseline().await;

        let mut sample = Sample::new();
        sample.cpu_percent = self.read_cpu_percent();
        sample.ram_percent = self.read_ram_percent();
        sample.disk_percent = self.read_disk_percent();
        sample.temp_celsius = self.read_temperature();
        sample.gpu_percent = self.read_gpu_percent();

        let missing = sample.unavailable_fields();
        if !missing.is_empty() {
            debug!(?missing, "some metrics unavailable");
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::traits::Probe;

    struct Fixed(Option<f64>);

    impl Probe for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn read(&mut self) -> Option<f64> {
            self.0
        }
    }

    fn in_range_or_sentinel(value: f64, max: f64) -> bool {
        value == UNAVAILABLE || (0.0..=max).contains(&value)
    }

    #[tokio::test]
    async fn test_system_collector_creation() {
        let collector = SystemCollector::new();
        assert!(collector.is_ok());
    }

    #[tokio::test]
    async fn test_sample_collection() {
        let mut collector = SystemCollector::new().unwrap();
        let sample = collector.collect_sample().await.unwrap();

        assert!(sample.timestamp > 0);
        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.ram_percent));
        assert!(in_range_or_sentinel(sample.disk_percent, 100.0));
        assert!(in_range_or_sentinel(sample.temp_celsius, 150.0));
        assert!(in_range_or_sentinel(sample.gpu_percent, 100.0));
    }

    #[tokio::test]
    async fn test_cpu_baseline_waits_without_blocking() {
        let started = Instant::now();
        let mut collector = SystemCollector::with_probes(Vec::new(), Vec::new(), Vec::new());

        // Another task keeps running while the first sample waits.
        let ticker = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        });
        collector.collect_sample().await.unwrap();
        assert!(ticker.is_finished());
        assert!(started.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL);

        let again = Instant::now();
        collector.collect_sample().await.unwrap();
        assert!(again.elapsed() < MINIMUM_CPU_UPDATE_INTERVAL);
    }

    #[test]
    fn test_injected_probes() {
        let mut collector = SystemCollector::with_probes(
            vec![PathBuf::from("/nonexistent/pc_meter")],
            vec![Box::new(Fixed(None)), Box::new(Fixed(Some(55.5)))],
            vec![Box::new(Fixed(Some(250.0)))],
        );

        assert_eq!(collector.read_temperature(), 55.5);
        assert_eq!(collector.read_gpu_percent(), UNAVAILABLE);
        assert_eq!(collector.read_disk_percent(), UNAVAILABLE);
    }
}

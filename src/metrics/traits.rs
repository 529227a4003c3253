//! Traits for metrics collection.

use crate::error::Result;
use crate::metrics::data::{Sample, UNAVAILABLE};
use tracing::trace;

/// Trait for collecting a full [`Sample`].
///
/// Individual metrics never fail: a missing sensor shows up as the sentinel
/// inside the sample. An `Err` means the whole collection pass went wrong and
/// the caller should skip this iteration.
pub trait MetricsProvider {
    /// Collect a single sample of all five metrics.
    fn collect_sample(&mut self) -> impl std::future::Future<Output = Result<Sample>> + Send;
}

/// One source in a fallback chain.
///
/// A probe returns `None` both when its hardware is absent and when the read
/// failed; the chain moves on to the next probe either way.
pub trait Probe {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Take a reading, or `None` when this source has nothing usable.
    fn read(&mut self) -> Option<f64>;
}

/// Boxed probe, as stored in a chain.
pub type BoxedProbe = Box<dyn Probe + Send>;

/// Try each probe in order and return the first reading inside `range`.
///
/// Returns [`UNAVAILABLE`] when every probe comes up empty.
pub fn first_reading(probes: &mut [BoxedProbe], range: std::ops::RangeInclusive<f64>) -> f64 {
    for probe in probes.iter_mut() {
        match probe.read() {
            Some(value) if range.contains(&value) => {
                trace!(probe = probe.name(), value, "probe reading accepted");
                return value;
            }
            Some(value) => {
                trace!(probe = probe.name(), value, "probe reading out of range");
            }
            None => {
                trace!(probe = probe.name(), "probe returned nothing");
            }
        }
    }
    UNAVAILABLE
}

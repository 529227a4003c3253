//! GPU load probes for the first detected GPU.

use crate::metrics::command::CommandProbe;
use crate::metrics::traits::{BoxedProbe, Probe};
use std::fs;
use std::path::PathBuf;

/// Build the probe chain for the current platform.
pub fn default_probes() -> Vec<BoxedProbe> {
    let mut probes: Vec<BoxedProbe> = vec![Box::new(NvidiaSmiProbe::new())];

    if cfg!(target_os = "linux") {
        probes.push(Box::new(DrmBusyProbe::default()));
    }

    probes
}

/// Parse the first GPU's utilization from `nvidia-smi` CSV output.
pub fn parse_nvidia_utilization(output: &str) -> Option<f64> {
    let first = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let value = first.trim_end_matches('%').trim().parse::<f64>().ok()?;
    Some(value)
}

/// NVIDIA GPUs through `nvidia-smi`.
pub struct NvidiaSmiProbe {
    command: CommandProbe,
}

impl NvidiaSmiProbe {
    pub fn new() -> Self {
        Self {
            command: CommandProbe::new(
                "nvidia-smi",
                ["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"],
            ),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for NvidiaSmiProbe {
    fn name(&self) -> &'static str {
        "nvidia_smi"
    }

    fn read(&mut self) -> Option<f64> {
        parse_nvidia_utilization(&self.command.run()?)
    }
}

/// AMD and Intel GPUs through DRM `gpu_busy_percent`.
pub struct DrmBusyProbe {
    root: PathBuf,
}

impl DrmBusyProbe {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for DrmBusyProbe {
    fn default() -> Self {
        Self::with_root("/sys/class/drm")
    }
}

impl Probe for DrmBusyProbe {
    fn name(&self) -> &'static str {
        "drm_busy_percent"
    }

    fn read(&mut self) -> Option<f64> {
        let entries = fs::read_dir(&self.root).ok()?;

        // Only whole cards ("card0"), not connectors ("card0-DP-1").
        let mut cards: Vec<(u32, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let index = name.strip_prefix("card")?.parse::<u32>().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        cards.sort_by_key(|(index, _)| *index);

        cards.into_iter().find_map(|(_, card)| {
            let raw = fs::read_to_string(card.join("device/gpu_busy_percent")).ok()?;
            raw.trim().parse::<f64>().ok()
        })
    }
}

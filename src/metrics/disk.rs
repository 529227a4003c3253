//! Disk usage with candidate-path fallback.

use crate::error::{Result, SystemError};
use crate::metrics::data::{percent_of, UNAVAILABLE};
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

/// Used and total space of one filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl DiskUsage {
    pub fn percent(&self) -> f64 {
        percent_of(self.used_bytes, self.total_bytes)
    }
}

/// Anything that can report the usage of the filesystem holding a path.
pub trait DiskSpaceSource {
    fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

impl DiskSpaceSource for Disks {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        // Surface missing drives as I/O errors before searching mounts.
        std::fs::metadata(path)?;

        // Longest mount point that contains the path wins.
        let disk = self
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .ok_or_else(|| {
                SystemError::sensor_error(format!("no filesystem mounted at {}", path.display()))
            })?;

        let total_bytes = disk.total_space();
        if total_bytes == 0 {
            return Err(SystemError::sensor_error(format!(
                "filesystem at {} reports zero size",
                disk.mount_point().display()
            )));
        }

        Ok(DiskUsage {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(disk.available_space()),
        })
    }
}

/// Paths to try, in order, when measuring the system drive.
pub fn default_candidates() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().ok();

    if cfg!(windows) {
        let mut candidates = vec![PathBuf::from("C:\\")];
        // Root of whatever drive we were started from.
        if let Some(root) = cwd.as_deref().and_then(|dir| dir.ancestors().last()) {
            candidates.push(root.to_path_buf());
        }
        candidates
    } else {
        let mut candidates = vec![PathBuf::from("/")];
        candidates.extend(cwd);
        candidates
    }
}

/// Usage percentage of the first candidate that can be measured.
pub fn disk_percent<S: DiskSpaceSource>(source: &S, candidates: &[PathBuf]) -> f64 {
    for candidate in candidates {
        match source.usage(candidate) {
            Ok(usage) => return usage.percent(),
            Err(err) => {
                debug!(path = %candidate.display(), error = %err, "disk candidate failed");
            }
        }
    }
    UNAVAILABLE
}

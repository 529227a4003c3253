//! CPU temperature probes.
//!
//! Sources are tried in order: the sensor list sysinfo exposes on every
//! platform first, then platform hardware-monitor interfaces (hwmon and
//! thermal zones on Linux, the Libre/OpenHardwareMonitor WMI bridges and ACPI
//! on Windows). Every source is optional and silently skipped when missing.

use crate::metrics::command::CommandProbe;
use crate::metrics::traits::{BoxedProbe, Probe};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use sysinfo::Components;

/// Plausible CPU temperature range in Celsius.
pub const PLAUSIBLE_RANGE: RangeInclusive<f64> = 0.0..=150.0;

/// Label keywords that mark an OS-exposed sensor as CPU-related.
pub const CPU_LABEL_KEYWORDS: &[&str] = &["cpu", "core", "package", "processor", "thermal", "temp"];

/// hwmon chip drivers that report the CPU die.
const HWMON_CPU_CHIPS: &[&str] = &["coretemp", "k10temp", "zenpower", "cpu_thermal", "soc_thermal"];

/// hwmon/WMI input labels that belong to the CPU.
const HW_CPU_LABELS: &[&str] = &["cpu", "core", "package", "tctl", "tdie"];

/// Thermal zone types that belong to the CPU.
const THERMAL_ZONE_CPU_TYPES: &[&str] = &["cpu", "x86_pkg_temp", "soc"];

/// A labelled temperature reading from any source.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub label: String,
    pub celsius: f64,
}

impl SensorReading {
    pub fn new(label: impl Into<String>, celsius: f64) -> Self {
        Self {
            label: label.into(),
            celsius,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Choose the CPU reading from an OS sensor list.
///
/// The first positive reading with a CPU-like label wins; failing that, the
/// first positive reading of any sensor.
pub fn pick_cpu_reading(readings: &[SensorReading]) -> Option<f64> {
    let positive = || readings.iter().filter(|r| r.celsius.is_finite() && r.celsius > 0.0);

    positive()
        .find(|r| contains_any(&r.label, CPU_LABEL_KEYWORDS))
        .or_else(|| positive().next())
        .map(|r| r.celsius)
}

/// Choose a CPU-labelled reading inside the plausible range.
///
/// GPU sensors are skipped even when their label mentions a core.
fn pick_labelled_in_range(readings: &[SensorReading], labels: &[&str]) -> Option<f64> {
    readings
        .iter()
        .filter(|r| PLAUSIBLE_RANGE.contains(&r.celsius))
        .filter(|r| !contains_any(&r.label, &["gpu"]))
        .find(|r| contains_any(&r.label, labels))
        .map(|r| r.celsius)
}

/// Build the probe chain for the current platform.
pub fn default_probes() -> Vec<BoxedProbe> {
    let mut probes: Vec<BoxedProbe> = vec![Box::new(ComponentsProbe::new())];

    if cfg!(target_os = "linux") {
        probes.push(Box::new(HwmonProbe::default()));
        probes.push(Box::new(ThermalZoneProbe::default()));
    }

    if cfg!(windows) {
        probes.push(Box::new(WmiSensorProbe::libre_hardware_monitor()));
        probes.push(Box::new(WmiSensorProbe::open_hardware_monitor()));
        probes.push(Box::new(AcpiThermalProbe::new()));
    }

    probes
}

/// Sensors reported by sysinfo.
pub struct ComponentsProbe {
    components: Components,
}

impl ComponentsProbe {
    pub fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for ComponentsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for ComponentsProbe {
    fn name(&self) -> &'static str {
        "components"
    }

    fn read(&mut self) -> Option<f64> {
        self.components.refresh();
        let readings: Vec<SensorReading> = self
            .components
            .iter()
            .map(|c| SensorReading::new(c.label(), c.temperature() as f64))
            .collect();
        pick_cpu_reading(&readings)
    }
}

/// Read a sysfs value in millidegrees and convert to Celsius.
fn read_millidegrees(path: &Path) -> Option<f64> {
    let raw = fs::read_to_string(path).ok()?;
    let milli: i64 = raw.trim().parse().ok()?;
    Some(milli as f64 / 1000.0)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Directory entries of `root` sorted by path, empty when unreadable.
fn sorted_entries(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    paths
}

/// Linux `/sys/class/hwmon` temperature inputs.
pub struct HwmonProbe {
    root: PathBuf,
}

impl HwmonProbe {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All temperature inputs, labelled `"<chip> <label>"`.
    pub fn readings(&self) -> Vec<SensorReading> {
        let mut readings = Vec::new();

        for hwmon_path in sorted_entries(&self.root) {
            let chip = read_trimmed(&hwmon_path.join("name")).unwrap_or_else(|| "unknown".to_string());

            for file in sorted_entries(&hwmon_path) {
                let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().to_string()) else {
                    continue;
                };
                let Some(sensor_num) = file_name
                    .strip_prefix("temp")
                    .and_then(|s| s.strip_suffix("_input"))
                else {
                    continue;
                };
                let Some(celsius) = read_millidegrees(&file) else {
                    continue;
                };

                let label = read_trimmed(&hwmon_path.join(format!("temp{}_label", sensor_num)))
                    .unwrap_or_else(|| format!("temp{}", sensor_num));

                readings.push(SensorReading::new(format!("{} {}", chip, label), celsius));
            }
        }

        readings
    }
}

impl Default for HwmonProbe {
    fn default() -> Self {
        Self::with_root("/sys/class/hwmon")
    }
}

impl Probe for HwmonProbe {
    fn name(&self) -> &'static str {
        "hwmon"
    }

    fn read(&mut self) -> Option<f64> {
        let readings = self.readings();
        // A CPU driver's first input is the package/die sensor.
        readings
            .iter()
            .filter(|r| PLAUSIBLE_RANGE.contains(&r.celsius))
            .find(|r| {
                let chip = r.label.split_whitespace().next().unwrap_or_default();
                HWMON_CPU_CHIPS.contains(&chip)
            })
            .map(|r| r.celsius)
            .or_else(|| pick_labelled_in_range(&readings, HW_CPU_LABELS))
    }
}

/// Linux `/sys/class/thermal/thermal_zone*` readings.
pub struct ThermalZoneProbe {
    root: PathBuf,
}

impl ThermalZoneProbe {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Readings labelled with the zone type.
    pub fn readings(&self) -> Vec<SensorReading> {
        sorted_entries(&self.root)
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("thermal_zone"))
            })
            .filter_map(|zone| {
                let zone_type = read_trimmed(&zone.join("type"))?;
                let celsius = read_millidegrees(&zone.join("temp"))?;
                Some(SensorReading::new(zone_type, celsius))
            })
            .collect()
    }
}

impl Default for ThermalZoneProbe {
    fn default() -> Self {
        Self::with_root("/sys/class/thermal")
    }
}

impl Probe for ThermalZoneProbe {
    fn name(&self) -> &'static str {
        "thermal_zone"
    }

    fn read(&mut self) -> Option<f64> {
        pick_labelled_in_range(&self.readings(), THERMAL_ZONE_CPU_TYPES)
    }
}

/// Parse `name|value` lines printed by the WMI sensor query.
pub fn parse_wmi_sensor_lines(output: &str) -> Vec<SensorReading> {
    output
        .lines()
        .filter_map(|line| {
            let (name, value) = line.trim().rsplit_once('|')?;
            let celsius = value.trim().replace(',', ".").parse::<f64>().ok()?;
            Some(SensorReading::new(name.trim(), celsius))
        })
        .collect()
}

/// Temperature sensors published by a hardware-monitor WMI bridge.
pub struct WmiSensorProbe {
    name: &'static str,
    command: CommandProbe,
}

impl WmiSensorProbe {
    fn for_namespace(name: &'static str, namespace: &str) -> Self {
        let script = format!(
            "Get-CimInstance -Namespace {} -ClassName Sensor -ErrorAction Stop \
             | Where-Object {{ $_.SensorType -eq 'Temperature' }} \
             | ForEach-Object {{ \"$($_.Name)|$($_.Value)\" }}",
            namespace
        );
        Self {
            name,
            command: CommandProbe::powershell(script),
        }
    }

    pub fn libre_hardware_monitor() -> Self {
        Self::for_namespace("libre_hardware_monitor", "root/LibreHardwareMonitor")
    }

    pub fn open_hardware_monitor() -> Self {
        Self::for_namespace("open_hardware_monitor", "root/OpenHardwareMonitor")
    }
}

impl Probe for WmiSensorProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&mut self) -> Option<f64> {
        let output = self.command.run()?;
        pick_labelled_in_range(&parse_wmi_sensor_lines(&output), HW_CPU_LABELS)
    }
}

/// Convert an ACPI thermal zone reading (tenths of Kelvin) to Celsius.
pub fn decikelvin_to_celsius(raw: f64) -> f64 {
    raw / 10.0 - 273.15
}

/// ACPI thermal zone exposed through `root/wmi`; usually needs elevation.
pub struct AcpiThermalProbe {
    command: CommandProbe,
}

impl AcpiThermalProbe {
    pub fn new() -> Self {
        Self {
            command: CommandProbe::powershell(
                "Get-CimInstance -Namespace root/wmi -ClassName MSAcpi_ThermalZoneTemperature \
                 -ErrorAction Stop | ForEach-Object { $_.CurrentTemperature }",
            ),
        }
    }
}

impl Default for AcpiThermalProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for AcpiThermalProbe {
    fn name(&self) -> &'static str {
        "acpi_thermal_zone"
    }

    fn read(&mut self) -> Option<f64> {
        let output = self.command.run()?;
        output
            .lines()
            .filter_map(|line| line.trim().parse::<f64>().ok())
            .map(decikelvin_to_celsius)
            .find(|celsius| PLAUSIBLE_RANGE.contains(celsius))
    }
}

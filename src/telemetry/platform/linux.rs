//! Linux sysfs Telemetry
//!
//! Energy:  /sys/class/powercap/intel-rapl:*       (energy_uj, wraps at max_energy_range_uj)
//! Freq:    /sys/devices/system/cpu/cpu<n>/cpufreq  (scaling_cur_freq, kHz)
//! Temp:    /sys/class/thermal/thermal_zone*        (type x86_pkg_temp, millidegrees)
//! Battery: /sys/class/power_supply/*               (type Battery / Mains)

use crate::core::errors::{SourceError, SourceResult};
use crate::telemetry::battery::{BatteryProbe, BatteryReading, PowerState};
use crate::telemetry::cpu_power::{EnergyReader, MsrFunction, MsrReading};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::trace;

const SYSFS_ROOT: &str = "/sys";

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_number<T: std::str::FromStr>(path: &Path) -> Option<T> {
    read_trimmed(path)?.parse().ok()
}

/// Sorted entries of `dir` whose file name starts with `prefix`
fn entries_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(prefix))
        })
        .collect();
    entries.sort();
    entries
}

// =============================================================================
// ENERGY
// =============================================================================

struct RaplDomain {
    name: String,
    energy_path: PathBuf,
    max_range_uj: u64,
    last_uj: u64,
    total_joules: f64,
}

struct FrequencyDomain {
    name: String,
    path: PathBuf,
}

struct ThermalZone {
    name: String,
    path: PathBuf,
}

/// Energy, frequency and package temperature from sysfs
pub struct SysfsEnergyReader {
    root: PathBuf,
    rapl: Vec<RaplDomain>,
    frequencies: Vec<FrequencyDomain>,
    thermal: Option<ThermalZone>,
    max_temperature: f64,
    last_read: Option<Instant>,
}

impl SysfsEnergyReader {
    pub fn new() -> Self {
        Self::with_root(SYSFS_ROOT)
    }

    /// Reader rooted somewhere other than `/sys`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rapl: Vec::new(),
            frequencies: Vec::new(),
            thermal: None,
            max_temperature: 0.0,
            last_read: None,
        }
    }

    fn discover_rapl(&mut self) {
        let powercap = self.root.join("class/powercap");
        for dir in entries_with_prefix(&powercap, "intel-rapl:") {
            let energy_path = dir.join("energy_uj");
            let Some(last_uj) = read_number::<u64>(&energy_path) else {
                continue;
            };
            let name = read_trimmed(&dir.join("name")).unwrap_or_else(|| {
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            self.rapl.push(RaplDomain {
                name,
                energy_path,
                max_range_uj: read_number(&dir.join("max_energy_range_uj")).unwrap_or(u64::MAX),
                last_uj,
                total_joules: 0.0,
            });
        }
    }

    fn discover_frequencies(&mut self) {
        let cpus = self.root.join("devices/system/cpu");
        for dir in entries_with_prefix(&cpus, "cpu") {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if !name[3..].chars().all(|c| c.is_ascii_digit()) || name.len() == 3 {
                continue;
            }
            let path = dir.join("cpufreq/scaling_cur_freq");
            if path.exists() {
                self.frequencies.push(FrequencyDomain { name, path });
            }
        }
    }

    fn discover_thermal(&mut self) {
        let thermal = self.root.join("class/thermal");
        for dir in entries_with_prefix(&thermal, "thermal_zone") {
            if read_trimmed(&dir.join("type")).as_deref() != Some("x86_pkg_temp") {
                continue;
            }
            self.max_temperature = critical_trip_point(&dir).unwrap_or(0.0);
            self.thermal = Some(ThermalZone {
                name: "Package".to_string(),
                path: dir.join("temp"),
            });
            break;
        }
    }
}

impl Default for SysfsEnergyReader {
    fn default() -> Self {
        Self::new()
    }
}

fn critical_trip_point(zone: &Path) -> Option<f64> {
    for type_path in entries_with_prefix(zone, "trip_point_") {
        let file = type_path.file_name()?.to_str()?;
        let Some(index) = file
            .strip_prefix("trip_point_")
            .and_then(|s| s.strip_suffix("_type"))
        else {
            continue;
        };
        if read_trimmed(&type_path).as_deref() == Some("critical") {
            let millis: f64 = read_number(&zone.join(format!("trip_point_{}_temp", index)))?;
            return Some(millis / 1000.0);
        }
    }
    None
}

impl EnergyReader for SysfsEnergyReader {
    fn initialize(&mut self) -> SourceResult<()> {
        self.discover_rapl();
        self.discover_frequencies();
        self.discover_thermal();

        if self.rapl.is_empty() && self.frequencies.is_empty() && self.thermal.is_none() {
            return Err(SourceError::unavailable("no sysfs energy, frequency or thermal data"));
        }
        trace!(
            rapl = self.rapl.len(),
            frequencies = self.frequencies.len(),
            thermal = self.thermal.is_some(),
            "sysfs energy reader initialized"
        );
        self.last_read = Some(Instant::now());
        Ok(())
    }

    fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    fn read(&mut self) -> SourceResult<Vec<MsrReading>> {
        let now = Instant::now();
        let elapsed = self
            .last_read
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_read = Some(now);

        let mut readings = Vec::new();

        for domain in &self.frequencies {
            if let Some(khz) = read_number::<f64>(&domain.path) {
                readings.push(MsrReading::new(
                    domain.name.clone(),
                    MsrFunction::Frequency,
                    [khz / 1000.0, 0.0, 0.0],
                ));
            }
        }

        for domain in &mut self.rapl {
            let Some(now_uj) = read_number::<u64>(&domain.energy_path) else {
                continue;
            };
            let delta_uj = if now_uj >= domain.last_uj {
                now_uj - domain.last_uj
            } else {
                // Counter wrapped
                domain.max_range_uj.saturating_sub(domain.last_uj) + now_uj
            };
            domain.last_uj = now_uj;

            let joules = delta_uj as f64 / 1_000_000.0;
            domain.total_joules += joules;
            let watts = if elapsed > 0.0 { joules / elapsed } else { 0.0 };
            readings.push(MsrReading::new(
                domain.name.clone(),
                MsrFunction::Power,
                [watts, domain.total_joules, 0.0],
            ));
        }

        if let Some(zone) = &self.thermal {
            if let Some(millis) = read_number::<f64>(&zone.path) {
                readings.push(MsrReading::new(
                    zone.name.clone(),
                    MsrFunction::Temperature,
                    [millis / 1000.0, 0.0, 0.0],
                ));
            }
        }

        Ok(readings)
    }
}

// =============================================================================
// BATTERY
// =============================================================================

/// Battery status from `/sys/class/power_supply`
pub struct SysfsBatteryProbe {
    root: PathBuf,
}

impl SysfsBatteryProbe {
    pub fn new() -> Self {
        Self::with_root(SYSFS_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsBatteryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryProbe for SysfsBatteryProbe {
    fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>> {
        let supplies_dir = self.root.join("class/power_supply");
        if !supplies_dir.is_dir() {
            return Err(SourceError::unavailable("no power_supply class"));
        }
        let supplies = entries_with_prefix(&supplies_dir, "");

        let on_line = supplies.iter().any(|dir| {
            read_trimmed(&dir.join("type")).as_deref() == Some("Mains")
                && read_trimmed(&dir.join("online")).as_deref() == Some("1")
        });

        Ok(supplies
            .iter()
            .filter(|dir| read_trimmed(&dir.join("type")).as_deref() == Some("Battery"))
            .map(|dir| battery_reading(dir, on_line))
            .collect())
    }
}

fn battery_reading(dir: &Path, on_line: bool) -> BatteryReading {
    let status = read_trimmed(&dir.join("status")).unwrap_or_default();
    let mut power_state = PowerState::NONE;
    match status.as_str() {
        "Charging" => power_state = power_state | PowerState::CHARGING,
        "Discharging" => power_state = power_state | PowerState::DISCHARGING,
        _ => {}
    }
    if on_line {
        power_state = power_state | PowerState::ON_LINE;
    }
    let discharging = power_state.contains(PowerState::DISCHARGING);
    let signed = |value: i64| if discharging { -value.abs() } else { value.abs() };

    let mut reading = BatteryReading {
        power_state,
        // Peripheral batteries (mice, headsets) report scope "Device"
        system_battery: read_trimmed(&dir.join("scope")).as_deref() != Some("Device"),
        ..BatteryReading::default()
    };

    let micro = |file: &str| read_number::<i64>(&dir.join(file));
    if let (Some(now), Some(full)) = (micro("energy_now"), micro("energy_full")) {
        // microwatt-hours to milliwatt-hours, microwatts to milliwatts
        reading.capacity = (now / 1000).max(0) as u32;
        reading.full_charged_capacity = (full / 1000).max(0) as u32;
        reading.rate = micro("power_now").map(|uw| signed(uw / 1000));
    } else if let (Some(now), Some(full)) = (micro("charge_now"), micro("charge_full")) {
        reading.capacity = (now / 1000).max(0) as u32;
        reading.full_charged_capacity = (full / 1000).max(0) as u32;
        reading.rate = micro("current_now").map(|ua| signed(ua / 1000));
        reading.relative_capacity = true;
    } else if let Some(percent) = micro("capacity") {
        reading.capacity = percent.max(0) as u32;
        reading.full_charged_capacity = 100;
        reading.relative_capacity = true;
    }
    reading
}

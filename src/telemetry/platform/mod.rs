/*!
 * Telemetry Platform Layer
 *
 * OS data sources behind the source traits:
 *
 * - Linux: sysfs (RAPL powercap, cpufreq, thermal zones, power_supply)
 *   and the coarse monotonic clock
 * - Other Unix: clock resolution only
 * - Windows: the Intel Power Gadget energy library, system power status
 *   and the NT timer resolution
 *
 * Anything a platform cannot provide is `Unsupported`, which reports
 * `Unavailable` and so drops out of every sampling session.
 */

use super::battery::{BatteryProbe, BatteryReading};
use super::cpu_power::{EnergyReader, MsrReading};
use super::timer::TimerClock;
use crate::core::errors::{SourceError, SourceResult};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::{SysfsBatteryProbe, SysfsEnergyReader};
#[cfg(unix)]
pub use unix::MonotonicClock;
#[cfg(windows)]
pub use self::windows::{NtTimerClock, PowerGadgetReader, SystemPowerProbe};

/// Placeholder for a subsystem the platform lacks
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl EnergyReader for Unsupported {
    fn initialize(&mut self) -> SourceResult<()> {
        Err(SourceError::unavailable("energy counters not supported"))
    }

    fn max_temperature(&self) -> f64 {
        0.0
    }

    fn read(&mut self) -> SourceResult<Vec<MsrReading>> {
        Err(SourceError::unavailable("energy counters not supported"))
    }
}

impl BatteryProbe for Unsupported {
    fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>> {
        Err(SourceError::unavailable("battery status not supported"))
    }
}

impl TimerClock for Unsupported {
    fn resolution_ms(&mut self) -> SourceResult<f64> {
        Err(SourceError::unavailable("timer resolution not supported"))
    }
}

/// CPU energy reader for this platform
pub fn energy_reader() -> Box<dyn EnergyReader> {
    #[cfg(target_os = "linux")]
    {
        Box::new(SysfsEnergyReader::new())
    }
    #[cfg(windows)]
    {
        Box::new(PowerGadgetReader::new())
    }
    #[cfg(not(any(target_os = "linux", windows)))]
    {
        Box::new(Unsupported)
    }
}

/// Battery probe for this platform
pub fn battery_probe() -> Box<dyn BatteryProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(SysfsBatteryProbe::new())
    }
    #[cfg(windows)]
    {
        Box::new(SystemPowerProbe)
    }
    #[cfg(not(any(target_os = "linux", windows)))]
    {
        Box::new(Unsupported)
    }
}

/// Timer resolution clock for this platform
pub fn timer_clock() -> Box<dyn TimerClock> {
    #[cfg(unix)]
    {
        Box::new(MonotonicClock)
    }
    #[cfg(windows)]
    {
        Box::new(NtTimerClock)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Box::new(Unsupported)
    }
}

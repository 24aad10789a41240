/*!
 * Telemetry
 *
 * Periodic sampling of power, battery, timer and performance-counter data.
 * Each subsystem is a `TelemetrySource`; any of them may be absent at
 * runtime, in which case it contributes nothing and the rest keep going.
 */

pub mod battery;
pub mod counters;
pub mod cpu_power;
pub mod monitor;
pub mod platform;
pub mod sample;
pub mod timer;

use crate::core::errors::SourceResult;
use crate::core::limits::{HEAVY_SAMPLING_INTERVAL, LIGHT_SAMPLING_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Re-export for convenience
pub use battery::{BatteryProbe, BatteryReading, BatterySource, PowerState};
pub use counters::{CounterBackend, PerfCounterSource, SysinfoCounters};
pub use cpu_power::{CpuPowerSource, EnergyReader, MsrFunction, MsrReading};
pub use monitor::{MonitorState, SamplingMonitor};
pub use sample::TelemetrySample;
pub use timer::{TimerClock, TimerResolutionSource};

/// Kind of data a source provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CpuPower,
    Battery,
    TimerResolution,
    PerfCounter,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CpuPower => "cpu_power",
            Capability::Battery => "battery",
            Capability::TimerResolution => "timer_resolution",
            Capability::PerfCounter => "perf_counter",
        }
    }
}

/// Sampling profile
///
/// Heavy samples five times a second and adds battery queries; it is only
/// worth its cost while a trace is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    Heavy,
    #[default]
    Light,
}

impl MonitorMode {
    pub fn interval(&self) -> Duration {
        match self {
            MonitorMode::Heavy => HEAVY_SAMPLING_INTERVAL,
            MonitorMode::Light => LIGHT_SAMPLING_INTERVAL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorMode::Heavy => "heavy",
            MonitorMode::Light => "light",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heavy" => Ok(MonitorMode::Heavy),
            "light" => Ok(MonitorMode::Light),
            other => Err(format!("unknown monitor mode: {}", other)),
        }
    }
}

/// Per-session parameters handed to every source when sampling starts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionConfig {
    pub mode: MonitorMode,
    pub perf_counters: Vec<String>,
}

/// Per-pass context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleContext {
    /// Pass number within the session, starting at 0
    pub sample_number: u64,
    pub mode: MonitorMode,
}

/// One independently optional telemetry subsystem
///
/// `open` failing with `Unavailable` removes the source from the session.
/// `sample` errors only skip the current pass for this source.
pub trait TelemetrySource: Send {
    fn capability(&self) -> Capability;

    /// Whether the source runs at all in `mode`
    fn enabled_in(&self, _mode: MonitorMode) -> bool {
        true
    }

    fn open(&mut self, _config: &SessionConfig) -> SourceResult<()> {
        Ok(())
    }

    fn sample(&mut self, ctx: &SampleContext, out: &mut Vec<TelemetrySample>) -> SourceResult<()>;

    /// Release per-session resources
    fn close(&mut self) {}
}

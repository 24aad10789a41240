/*!
 * Battery Status Source
 *
 * Reports charge state, percentage and charge/discharge rate for every
 * system battery. Heavy mode only: querying battery drivers is too costly
 * to do once a second for the whole lifetime of the process.
 */

use super::sample::TelemetrySample;
use super::{Capability, MonitorMode, SampleContext, TelemetrySource};
use crate::core::errors::SourceResult;
use crate::core::limits::{MAX_BATTERIES, MILLIWATTS_PER_WATT};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use tracing::trace;

/// Battery power-state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerState(u32);

impl PowerState {
    pub const NONE: Self = Self(0);
    pub const ON_LINE: Self = Self(0x1);
    pub const DISCHARGING: Self = Self(0x2);
    pub const CHARGING: Self = Self(0x4);
    pub const CRITICAL: Self = Self(0x8);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Human-readable state, e.g. `Charging, on AC power`
    pub fn describe(&self) -> String {
        let mut text = String::new();
        if self.contains(Self::CHARGING) {
            text.push_str("Charging");
        }
        if self.contains(Self::DISCHARGING) {
            text.push_str("Discharging");
        }
        if self.contains(Self::ON_LINE) {
            if text.is_empty() {
                text.push_str("On AC power");
            } else {
                text.push_str(", on AC power");
            }
        }
        text
    }
}

impl BitOr for PowerState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Status of one battery as reported by the OS
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatteryReading {
    pub power_state: PowerState,
    /// Remaining capacity, in the battery's capacity units
    pub capacity: u32,
    pub full_charged_capacity: u32,
    /// Charge (+) or discharge (-) rate; `None` when the driver does not know
    pub rate: Option<i64>,
    /// Capacity and rate are relative values rather than mWh / mW
    pub relative_capacity: bool,
    /// Battery powers the system (not a UPS or peripheral)
    pub system_battery: bool,
}

impl BatteryReading {
    pub fn percent(&self) -> f64 {
        if self.full_charged_capacity == 0 {
            return 0.0;
        }
        self.capacity as f64 * 100.0 / self.full_charged_capacity as f64
    }

    pub fn rate_description(&self) -> String {
        match self.rate {
            None => "Unknown rate".to_string(),
            Some(rate) if self.relative_capacity => format!("{} (unknown units)", rate),
            Some(rate) => format!("{:.3} watts", rate as f64 / MILLIWATTS_PER_WATT),
        }
    }
}

/// OS battery enumeration
pub trait BatteryProbe: Send {
    /// Current status of each present battery
    fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>>;
}

/// Battery TelemetrySource
pub struct BatterySource {
    probe: Box<dyn BatteryProbe>,
}

impl BatterySource {
    pub fn new(probe: Box<dyn BatteryProbe>) -> Self {
        Self { probe }
    }
}

impl TelemetrySource for BatterySource {
    fn capability(&self) -> Capability {
        Capability::Battery
    }

    fn enabled_in(&self, mode: MonitorMode) -> bool {
        mode == MonitorMode::Heavy
    }

    fn sample(&mut self, _ctx: &SampleContext, out: &mut Vec<TelemetrySample>) -> SourceResult<()> {
        let batteries = self.probe.batteries()?;
        for reading in batteries.iter().take(MAX_BATTERIES) {
            if !reading.system_battery {
                trace!("Skipping non-system battery");
                continue;
            }
            out.push(TelemetrySample::BatteryStatus {
                state: reading.power_state,
                percent: reading.percent(),
                rate: reading.rate_description(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SourceError;
    use pretty_assertions::assert_eq;

    struct FixedProbe(SourceResult<Vec<BatteryReading>>);

    impl BatteryProbe for FixedProbe {
        fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>> {
            self.0.clone()
        }
    }

    fn reading(state: PowerState, rate: Option<i64>) -> BatteryReading {
        BatteryReading {
            power_state: state,
            capacity: 30_000,
            full_charged_capacity: 40_000,
            rate,
            relative_capacity: false,
            system_battery: true,
        }
    }

    #[test]
    fn test_state_descriptions() {
        assert_eq!(PowerState::CHARGING.describe(), "Charging");
        assert_eq!(
            (PowerState::CHARGING | PowerState::ON_LINE).describe(),
            "Charging, on AC power"
        );
        assert_eq!(PowerState::ON_LINE.describe(), "On AC power");
        assert_eq!(PowerState::NONE.describe(), "");
    }

    #[test]
    fn test_rate_descriptions() {
        assert_eq!(reading(PowerState::NONE, None).rate_description(), "Unknown rate");
        assert_eq!(
            reading(PowerState::NONE, Some(-12_345)).rate_description(),
            "-12.345 watts"
        );

        let mut relative = reading(PowerState::NONE, Some(42));
        relative.relative_capacity = true;
        assert_eq!(relative.rate_description(), "42 (unknown units)");
    }

    #[test]
    fn test_percent() {
        assert_eq!(reading(PowerState::NONE, None).percent(), 75.0);
        let mut empty = reading(PowerState::NONE, None);
        empty.full_charged_capacity = 0;
        assert_eq!(empty.percent(), 0.0);
    }

    #[test]
    fn test_sample_filters_and_caps() {
        let mut readings = vec![reading(PowerState::DISCHARGING, Some(-8000)); 7];
        readings[1].system_battery = false;

        let mut source = BatterySource::new(Box::new(FixedProbe(Ok(readings))));
        let ctx = SampleContext {
            sample_number: 0,
            mode: MonitorMode::Heavy,
        };
        let mut out = Vec::new();
        source.sample(&ctx, &mut out).unwrap();

        // Five enumerated, one of them not a system battery
        assert_eq!(out.len(), 4);
        assert_eq!(
            out[0],
            TelemetrySample::BatteryStatus {
                state: PowerState::DISCHARGING,
                percent: 75.0,
                rate: "-8.000 watts".to_string(),
            }
        );
    }

    #[test]
    fn test_heavy_mode_only() {
        let source = BatterySource::new(Box::new(FixedProbe(Err(SourceError::unavailable(
            "no battery",
        )))));
        assert!(source.enabled_in(MonitorMode::Heavy));
        assert!(!source.enabled_in(MonitorMode::Light));
    }
}

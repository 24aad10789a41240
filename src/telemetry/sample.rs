/*!
 * Telemetry Samples
 * One variant per EventSink call
 */

use super::battery::PowerState;
use crate::monitoring::EventSink;
use serde::{Deserialize, Serialize};

/// A single structured measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySample {
    Frequency {
        name: String,
        mhz: f64,
    },
    Power {
        name: String,
        watts: f64,
        joules: f64,
    },
    Temperature {
        name: String,
        celsius: f64,
        max_celsius: f64,
    },
    BatteryStatus {
        state: PowerState,
        percent: f64,
        rate: String,
    },
    TimerResolution {
        ms: f64,
    },
    Counter {
        index: u64,
        name: String,
        value: f64,
    },
}

impl TelemetrySample {
    /// Forward to the matching sink call
    pub fn emit(&self, sink: &dyn EventSink) {
        match self {
            TelemetrySample::Frequency { name, mhz } => sink.cpu_frequency(name, *mhz),
            TelemetrySample::Power {
                name,
                watts,
                joules,
            } => sink.cpu_power(name, *watts, *joules),
            TelemetrySample::Temperature {
                name,
                celsius,
                max_celsius,
            } => sink.cpu_temperature(name, *celsius, *max_celsius),
            TelemetrySample::BatteryStatus {
                state,
                percent,
                rate,
            } => sink.battery_status(&state.describe(), *percent, rate),
            TelemetrySample::TimerResolution { ms } => sink.timer_resolution(*ms),
            TelemetrySample::Counter { index, name, value } => {
                sink.perf_counter(*index, name, *value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::MockEventSink;
    use mockall::predicate::eq;

    #[test]
    fn test_each_variant_is_one_call() {
        let mut sink = MockEventSink::new();
        sink.expect_cpu_frequency()
            .with(eq("Package"), eq(2400.0))
            .times(1)
            .return_const(());
        sink.expect_cpu_power()
            .with(eq("Package"), eq(4.5), eq(10.0))
            .times(1)
            .return_const(());
        sink.expect_cpu_temperature()
            .with(eq("Package"), eq(61.0), eq(100.0))
            .times(1)
            .return_const(());
        sink.expect_battery_status()
            .with(eq("Discharging"), eq(50.0), eq("Unknown rate"))
            .times(1)
            .return_const(());
        sink.expect_timer_resolution()
            .with(eq(15.625))
            .times(1)
            .return_const(());
        sink.expect_perf_counter()
            .with(eq(3u64), eq("cpu.usage"), eq(7.5))
            .times(1)
            .return_const(());
        sink.expect_output().never();

        let samples = vec![
            TelemetrySample::Frequency {
                name: "Package".into(),
                mhz: 2400.0,
            },
            TelemetrySample::Power {
                name: "Package".into(),
                watts: 4.5,
                joules: 10.0,
            },
            TelemetrySample::Temperature {
                name: "Package".into(),
                celsius: 61.0,
                max_celsius: 100.0,
            },
            TelemetrySample::BatteryStatus {
                state: PowerState::DISCHARGING,
                percent: 50.0,
                rate: "Unknown rate".into(),
            },
            TelemetrySample::TimerResolution { ms: 15.625 },
            TelemetrySample::Counter {
                index: 3,
                name: "cpu.usage".into(),
                value: 7.5,
            },
        ];
        for sample in &samples {
            sample.emit(&sink);
        }
    }
}

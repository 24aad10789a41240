/*!
 * Event Sink
 *
 * Destination for telemetry samples, input records and captured process
 * output. One method per sample kind; calls are fire-and-forget and the
 * callers never inspect sink failures.
 */

use crate::input::InputRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, info};

/// Consumer of structured samples and text output
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn cpu_frequency(&self, name: &str, mhz: f64);
    fn cpu_power(&self, name: &str, watts: f64, joules: f64);
    fn cpu_temperature(&self, name: &str, celsius: f64, max_celsius: f64);
    fn battery_status(&self, state: &str, percent: f64, rate: &str);
    fn timer_resolution(&self, ms: f64);
    fn perf_counter(&self, index: u64, name: &str, value: f64);

    /// Keyboard and mouse activity; ignored unless the sink cares
    fn input(&self, _record: &InputRecord) {}

    /// Text destined for the user (echoed commands, process output)
    fn output(&self, text: &str);
}

/// Owned copy of one sink call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    CpuFrequency {
        name: String,
        mhz: f64,
    },
    CpuPower {
        name: String,
        watts: f64,
        joules: f64,
    },
    CpuTemperature {
        name: String,
        celsius: f64,
        max_celsius: f64,
    },
    BatteryStatus {
        state: String,
        percent: f64,
        rate: String,
    },
    TimerResolution {
        ms: f64,
    },
    PerfCounter {
        index: u64,
        name: String,
        value: f64,
    },
    Input {
        record: InputRecord,
    },
    Output {
        text: String,
    },
}

impl SinkEvent {
    /// True for events produced by the sampling loop
    pub fn is_telemetry(&self) -> bool {
        !matches!(self, SinkEvent::Input { .. } | SinkEvent::Output { .. })
    }
}

// =============================================================================
// TRACING SINK
// =============================================================================

/// Sink that turns every call into a structured `tracing` event
///
/// With console output enabled, text is also written to stdout.
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    console: bool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print `output` text to stdout
    pub fn with_console() -> Self {
        Self { console: true }
    }
}

impl EventSink for TracingSink {
    fn cpu_frequency(&self, name: &str, mhz: f64) {
        info!(target: "trace_helper::telemetry", name, mhz, "cpu_frequency");
    }

    fn cpu_power(&self, name: &str, watts: f64, joules: f64) {
        info!(target: "trace_helper::telemetry", name, watts, joules, "cpu_power");
    }

    fn cpu_temperature(&self, name: &str, celsius: f64, max_celsius: f64) {
        info!(target: "trace_helper::telemetry", name, celsius, max_celsius, "cpu_temperature");
    }

    fn battery_status(&self, state: &str, percent: f64, rate: &str) {
        info!(target: "trace_helper::telemetry", state, percent, rate, "battery_status");
    }

    fn timer_resolution(&self, ms: f64) {
        info!(target: "trace_helper::telemetry", ms, "timer_resolution");
    }

    fn perf_counter(&self, index: u64, name: &str, value: f64) {
        info!(target: "trace_helper::telemetry", index, name, value, "perf_counter");
    }

    fn input(&self, record: &InputRecord) {
        info!(
            target: "trace_helper::input",
            kind = record.kind(),
            label = %record.label,
            x = record.x,
            y = record.y,
            "input"
        );
    }

    fn output(&self, text: &str) {
        if self.console {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        } else {
            debug!(target: "trace_helper::output", len = text.len(), text, "output");
        }
    }
}

// =============================================================================
// MEMORY SINK
// =============================================================================

/// Sink that records every call, for inspection by tests and tools
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Remove and return the recorded events
    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|&e| predicate(e)).count()
    }

    /// All `output` text concatenated in arrival order
    pub fn output_text(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Output { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

impl EventSink for MemorySink {
    fn cpu_frequency(&self, name: &str, mhz: f64) {
        self.record(SinkEvent::CpuFrequency {
            name: name.to_string(),
            mhz,
        });
    }

    fn cpu_power(&self, name: &str, watts: f64, joules: f64) {
        self.record(SinkEvent::CpuPower {
            name: name.to_string(),
            watts,
            joules,
        });
    }

    fn cpu_temperature(&self, name: &str, celsius: f64, max_celsius: f64) {
        self.record(SinkEvent::CpuTemperature {
            name: name.to_string(),
            celsius,
            max_celsius,
        });
    }

    fn battery_status(&self, state: &str, percent: f64, rate: &str) {
        self.record(SinkEvent::BatteryStatus {
            state: state.to_string(),
            percent,
            rate: rate.to_string(),
        });
    }

    fn timer_resolution(&self, ms: f64) {
        self.record(SinkEvent::TimerResolution { ms });
    }

    fn perf_counter(&self, index: u64, name: &str, value: f64) {
        self.record(SinkEvent::PerfCounter {
            index,
            name: name.to_string(),
            value,
        });
    }

    fn input(&self, record: &InputRecord) {
        self.record(SinkEvent::Input {
            record: record.clone(),
        });
    }

    fn output(&self, text: &str) {
        self.record(SinkEvent::Output {
            text: text.to_string(),
        });
    }
}

// =============================================================================
// JSON LINES SINK
// =============================================================================

/// Sink writing one JSON object per call to any writer
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn record(&self, event: SinkEvent) {
        let mut writer = self.writer.lock();
        let written = serde_json::to_writer(&mut *writer, &event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            debug!(error = %e, "Dropped sink event");
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn cpu_frequency(&self, name: &str, mhz: f64) {
        self.record(SinkEvent::CpuFrequency {
            name: name.to_string(),
            mhz,
        });
    }

    fn cpu_power(&self, name: &str, watts: f64, joules: f64) {
        self.record(SinkEvent::CpuPower {
            name: name.to_string(),
            watts,
            joules,
        });
    }

    fn cpu_temperature(&self, name: &str, celsius: f64, max_celsius: f64) {
        self.record(SinkEvent::CpuTemperature {
            name: name.to_string(),
            celsius,
            max_celsius,
        });
    }

    fn battery_status(&self, state: &str, percent: f64, rate: &str) {
        self.record(SinkEvent::BatteryStatus {
            state: state.to_string(),
            percent,
            rate: rate.to_string(),
        });
    }

    fn timer_resolution(&self, ms: f64) {
        self.record(SinkEvent::TimerResolution { ms });
    }

    fn perf_counter(&self, index: u64, name: &str, value: f64) {
        self.record(SinkEvent::PerfCounter {
            index,
            name: name.to_string(),
            value,
        });
    }

    fn input(&self, record: &InputRecord) {
        self.record(SinkEvent::Input {
            record: record.clone(),
        });
    }

    fn output(&self, text: &str) {
        self.record(SinkEvent::Output {
            text: text.to_string(),
        });
    }
}

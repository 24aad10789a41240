/*!
 * Sampling Monitor
 *
 * Owns the telemetry sources and a single `power-monitor` thread that
 * polls them once per interval. Cancellation is cooperative: the thread
 * waits on the stop channel with the interval as its timeout, so a stop
 * request takes effect after at most one in-flight sampling pass.
 */

use super::counters::{PerfCounterSource, SysinfoCounters};
use super::{
    platform, BatterySource, CpuPowerSource, MonitorMode, SampleContext, SessionConfig,
    TelemetrySample, TelemetrySource, TimerResolutionSource,
};
use crate::core::config::split_counter_list;
use crate::core::errors::{MonitorError, MonitorResult};
use crate::monitoring::{note_slow_pass, EventSink, SessionSpan};
use flume::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, trace, warn};

type Sources = Arc<Mutex<Vec<Box<dyn TelemetrySource>>>>;

/// Monitor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
}

struct Session {
    stop: Sender<()>,
    handle: JoinHandle<u64>,
    mode: MonitorMode,
    session_id: String,
}

/// Periodic sampler over a set of telemetry sources
pub struct SamplingMonitor {
    sink: Arc<dyn EventSink>,
    sources: Sources,
    perf_counters: String,
    session: Option<Session>,
}

impl SamplingMonitor {
    /// Monitor with no sources
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            sources: Arc::new(Mutex::new(Vec::new())),
            perf_counters: String::new(),
            session: None,
        }
    }

    /// Monitor with this platform's sources, in sampling order: battery,
    /// CPU power, timer resolution, performance counters
    pub fn with_default_sources(sink: Arc<dyn EventSink>) -> Self {
        Self::new(sink)
            .with_source(Box::new(BatterySource::new(platform::battery_probe())))
            .with_source(Box::new(CpuPowerSource::new(platform::energy_reader())))
            .with_source(Box::new(TimerResolutionSource::new(platform::timer_clock())))
            .with_source(Box::new(PerfCounterSource::new(Box::new(
                SysinfoCounters::new(),
            ))))
    }

    /// Append a source; sources are sampled in insertion order
    pub fn with_source(self, source: Box<dyn TelemetrySource>) -> Self {
        self.sources.lock().push(source);
        self
    }

    /// Replace the `;`-delimited counter list used by the next session
    pub fn set_perf_counters(&mut self, counters: &str) -> MonitorResult<()> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }
        self.perf_counters = counters.to_string();
        Ok(())
    }

    pub fn perf_counters(&self) -> &str {
        &self.perf_counters
    }

    pub fn state(&self) -> MonitorState {
        if self.session.is_some() {
            MonitorState::Running
        } else {
            MonitorState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Mode of the running session
    pub fn mode(&self) -> Option<MonitorMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Correlation id of the running session
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    /// Start sampling in `mode`
    pub fn start_threads(&mut self, mode: MonitorMode) -> MonitorResult<()> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }

        let (stop, stop_rx) = flume::bounded(1);
        let config = SessionConfig {
            mode,
            perf_counters: split_counter_list(&self.perf_counters),
        };
        let span = SessionSpan::new(mode.as_str(), mode.interval().as_millis() as u64);
        let session_id = span.session_id().to_string();
        let sources = self.sources.clone();
        let sink = self.sink.clone();

        let handle = thread::Builder::new()
            .name("power-monitor".to_string())
            .spawn(move || {
                let mut sources = sources.lock();
                sampling_loop(&mut sources, sink.as_ref(), &config, &stop_rx, &span)
            })
            .map_err(|e| MonitorError::ThreadSpawn(e.to_string()))?;

        debug!(session_id = %session_id, mode = %mode, "Sampling started");
        self.session = Some(Session {
            stop,
            handle,
            mode,
            session_id,
        });
        Ok(())
    }

    /// Stop sampling and wait for the thread to exit; no-op when idle
    pub fn stop_threads(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let _ = session.stop.send(());
        drop(session.stop);
        match session.handle.join() {
            Ok(passes) => debug!(session_id = %session.session_id, passes, "Sampling stopped"),
            Err(_) => warn!(session_id = %session.session_id, "Sampling thread panicked"),
        }
    }
}

impl Drop for SamplingMonitor {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

impl std::fmt::Debug for SamplingMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingMonitor")
            .field("state", &self.state())
            .field("mode", &self.mode())
            .field("perf_counters", &self.perf_counters)
            .finish()
    }
}

/// Body of the sampling thread; returns the number of completed passes
fn sampling_loop(
    sources: &mut [Box<dyn TelemetrySource>],
    sink: &dyn EventSink,
    config: &SessionConfig,
    stop: &Receiver<()>,
    span: &SessionSpan,
) -> u64 {
    let _entered = span.enter();

    let open: Vec<bool> = sources
        .iter_mut()
        .map(|source| {
            if !source.enabled_in(config.mode) {
                return false;
            }
            match source.open(config) {
                Ok(()) => true,
                Err(e) => {
                    trace!(source = source.capability().as_str(), error = %e, "Source unavailable");
                    false
                }
            }
        })
        .collect();

    let interval = config.mode.interval();
    let mut sample_number = 0u64;
    let mut samples: Vec<TelemetrySample> = Vec::new();

    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let started = Instant::now();
        let ctx = SampleContext {
            sample_number,
            mode: config.mode,
        };
        for (source, _) in sources.iter_mut().zip(&open).filter(|(_, open)| **open) {
            samples.clear();
            let result = source.sample(&ctx, &mut samples);
            for sample in &samples {
                sample.emit(sink);
            }
            if let Err(e) = result {
                trace!(source = source.capability().as_str(), error = %e, "Sample skipped");
            }
        }
        sample_number += 1;
        span.record_samples(sample_number);
        note_slow_pass(
            span.session_id(),
            started.elapsed().as_millis(),
            interval.as_millis(),
        );
    }

    for (source, _) in sources.iter_mut().zip(&open).filter(|(_, open)| **open) {
        source.close();
    }
    sample_number
}

/*!
 * Sampling Monitor Tests
 * Session lifecycle, per-mode source selection and counter indexing
 * against scripted platform sources
 */

use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trace_helper::telemetry::{
    BatteryProbe, BatteryReading, BatterySource, CounterBackend, CpuPowerSource, EnergyReader,
    MsrFunction, MsrReading, PerfCounterSource, PowerState, TimerClock, TimerResolutionSource,
};
use trace_helper::{
    MemorySink, MonitorError, MonitorMode, MonitorState, SamplingMonitor, SinkEvent, SourceError,
    SourceResult,
};

// =============================================================================
// SCRIPTED SOURCES
// =============================================================================

struct FixedEnergy {
    init_calls: Arc<AtomicUsize>,
    fail_init: bool,
}

impl EnergyReader for FixedEnergy {
    fn initialize(&mut self) -> SourceResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            Err(SourceError::unavailable("no energy library"))
        } else {
            Ok(())
        }
    }

    fn max_temperature(&self) -> f64 {
        100.0
    }

    fn read(&mut self) -> SourceResult<Vec<MsrReading>> {
        Ok(vec![
            MsrReading::new("Package", MsrFunction::Power, [4.123456, 10.5, 0.0]),
            MsrReading::new("Package", MsrFunction::Temperature, [55.0, 0.0, 0.0]),
        ])
    }
}

struct OneBattery;

impl BatteryProbe for OneBattery {
    fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>> {
        Ok(vec![BatteryReading {
            power_state: PowerState::DISCHARGING,
            capacity: 40_000,
            full_charged_capacity: 50_000,
            rate: Some(-12_500),
            relative_capacity: false,
            system_battery: true,
        }])
    }
}

struct FixedClock;

impl TimerClock for FixedClock {
    fn resolution_ms(&mut self) -> SourceResult<f64> {
        Ok(15.625)
    }
}

struct OnlyCounter(&'static str);

impl CounterBackend for OnlyCounter {
    fn resolve(&mut self, name: &str) -> bool {
        name == self.0
    }

    fn collect(&mut self) {}

    fn value(&self, _name: &str) -> Option<f64> {
        Some(1.0)
    }
}

fn scripted_monitor(sink: Arc<MemorySink>, fail_energy_init: bool) -> (SamplingMonitor, Arc<AtomicUsize>) {
    let init_calls = Arc::new(AtomicUsize::new(0));
    let monitor = SamplingMonitor::new(sink)
        .with_source(Box::new(BatterySource::new(Box::new(OneBattery))))
        .with_source(Box::new(CpuPowerSource::new(Box::new(FixedEnergy {
            init_calls: init_calls.clone(),
            fail_init: fail_energy_init,
        }))))
        .with_source(Box::new(TimerResolutionSource::new(Box::new(FixedClock))))
        .with_source(Box::new(PerfCounterSource::new(Box::new(OnlyCounter("cpu.usage")))));
    (monitor, init_calls)
}

fn run_for(monitor: &mut SamplingMonitor, mode: MonitorMode, duration: Duration) {
    monitor.start_threads(mode).unwrap();
    assert_eq!(monitor.state(), MonitorState::Running);
    thread::sleep(duration);
    monitor.stop_threads();
    assert_eq!(monitor.state(), MonitorState::Idle);
}

fn counter_indices(events: &[SinkEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::PerfCounter { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[test]
fn test_light_mode_samples_without_battery_or_counters() {
    let sink = Arc::new(MemorySink::new());
    let (mut monitor, _) = scripted_monitor(sink.clone(), false);

    run_for(&mut monitor, MonitorMode::Light, Duration::from_millis(3500));

    let power = sink.count(|e| matches!(e, SinkEvent::CpuPower { .. }));
    let timer = sink.count(|e| matches!(e, SinkEvent::TimerResolution { .. }));
    assert!(power >= 3, "expected at least 3 power samples, got {}", power);
    assert_eq!(power, timer);
    assert_eq!(sink.count(|e| matches!(e, SinkEvent::BatteryStatus { .. })), 0);
    assert_eq!(sink.count(|e| matches!(e, SinkEvent::PerfCounter { .. })), 0);

    let first_power = sink
        .events()
        .into_iter()
        .find(|e| matches!(e, SinkEvent::CpuPower { .. }))
        .unwrap();
    assert_eq!(
        first_power,
        SinkEvent::CpuPower {
            name: "Package".to_string(),
            watts: 4.1235,
            joules: 10.5
        }
    );
}

#[test]
fn test_heavy_mode_includes_battery() {
    let sink = Arc::new(MemorySink::new());
    let (mut monitor, _) = scripted_monitor(sink.clone(), false);

    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(900));

    let batteries: Vec<SinkEvent> = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, SinkEvent::BatteryStatus { .. }))
        .collect();
    assert!(batteries.len() >= 2, "got {} battery samples", batteries.len());
    assert_eq!(
        batteries[0],
        SinkEvent::BatteryStatus {
            state: "Discharging".to_string(),
            percent: 80.0,
            rate: "-12.500 watts".to_string()
        }
    );
}

#[test]
fn test_counter_index_restarts_each_session() {
    let sink = Arc::new(MemorySink::new());
    let (mut monitor, _) = scripted_monitor(sink.clone(), false);
    monitor.set_perf_counters("cpu.usage; no.such.counter").unwrap();

    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(900));
    let first = counter_indices(&sink.take());
    assert!(first.len() >= 2);
    assert_eq!(first, (0..first.len() as u64).collect::<Vec<_>>());

    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(500));
    let second = counter_indices(&sink.take());
    assert_eq!(second.first(), Some(&0));
}

#[test]
fn test_unavailable_energy_reader_is_skipped() {
    let sink = Arc::new(MemorySink::new());
    let (mut monitor, init_calls) = scripted_monitor(sink.clone(), true);

    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(700));
    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(500));

    assert_eq!(sink.count(|e| matches!(e, SinkEvent::CpuPower { .. })), 0);
    assert!(sink.count(|e| matches!(e, SinkEvent::TimerResolution { .. })) >= 2);
    // A failed initialization is not retried
    assert_eq!(init_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lifecycle_preconditions() {
    let sink = Arc::new(MemorySink::new());
    let (mut monitor, _) = scripted_monitor(sink, false);

    monitor.stop_threads();
    assert_eq!(monitor.state(), MonitorState::Idle);

    monitor.start_threads(MonitorMode::Light).unwrap();
    assert_eq!(
        monitor.start_threads(MonitorMode::Light),
        Err(MonitorError::AlreadyRunning)
    );
    assert_eq!(
        monitor.set_perf_counters("cpu.usage"),
        Err(MonitorError::AlreadyRunning)
    );
    assert!(monitor.session_id().is_some());
    drop(monitor);
}

#[test]
fn test_default_sources_start_and_stop() {
    let sink = Arc::new(MemorySink::new());
    let mut monitor = SamplingMonitor::with_default_sources(sink.clone());
    monitor.set_perf_counters("cpu.usage;memory.used").unwrap();

    run_for(&mut monitor, MonitorMode::Heavy, Duration::from_millis(700));
    assert!(sink.events().iter().all(SinkEvent::is_telemetry));
}

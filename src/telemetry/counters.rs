/*!
 * Performance Counter Source
 *
 * Counters are named by identifier in a `;`-delimited list and resolved
 * once when the session opens. The first collection is discarded: rate
 * counters (CPU usage in particular) only mean something from the second
 * reading on.
 *
 * Identifiers understood by the sysinfo backend:
 * - `cpu.usage`, `cpu.usage.<n>` (percent)
 * - `cpu.frequency.<n>` (MHz)
 * - `memory.used`, `memory.available`, `memory.total`, `swap.used` (bytes)
 * - `load.1`, `load.5`, `load.15`
 */

use super::sample::TelemetrySample;
use super::{Capability, SampleContext, SessionConfig, TelemetrySource};
use crate::core::errors::{SourceError, SourceResult};
use sysinfo::System;
use tracing::{debug, trace};

/// Counter provider
pub trait CounterBackend: Send {
    /// Whether `name` can be read by this backend
    fn resolve(&mut self, name: &str) -> bool;

    /// Refresh all counter data
    fn collect(&mut self);

    /// Latest value of a resolved counter
    fn value(&self, name: &str) -> Option<f64>;

    /// Drop per-session resources
    fn release(&mut self) {}
}

/// Perf-counter TelemetrySource
pub struct PerfCounterSource {
    backend: Box<dyn CounterBackend>,
    active: Vec<String>,
}

impl PerfCounterSource {
    pub fn new(backend: Box<dyn CounterBackend>) -> Self {
        Self {
            backend,
            active: Vec::new(),
        }
    }

    /// Counters resolved for the current session
    pub fn active(&self) -> &[String] {
        &self.active
    }
}

impl TelemetrySource for PerfCounterSource {
    fn capability(&self) -> Capability {
        Capability::PerfCounter
    }

    fn open(&mut self, config: &SessionConfig) -> SourceResult<()> {
        self.active.clear();
        for name in &config.perf_counters {
            if self.backend.resolve(name) {
                self.active.push(name.clone());
            } else {
                debug!(counter = %name, "Unknown performance counter");
            }
        }

        if self.active.is_empty() {
            return Err(SourceError::unavailable("no performance counters configured"));
        }

        // Priming read, discarded
        self.backend.collect();
        trace!(counters = self.active.len(), "Performance counters opened");
        Ok(())
    }

    fn sample(&mut self, ctx: &SampleContext, out: &mut Vec<TelemetrySample>) -> SourceResult<()> {
        self.backend.collect();
        for name in &self.active {
            match self.backend.value(name) {
                Some(value) => out.push(TelemetrySample::Counter {
                    index: ctx.sample_number,
                    name: name.clone(),
                    value,
                }),
                None => debug!(counter = %name, "Counter read failed"),
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.active.clear();
        self.backend.release();
    }
}

// =============================================================================
// SYSINFO BACKEND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SysCounter {
    CpuUsage,
    CoreUsage(usize),
    CoreFrequency(usize),
    MemoryUsed,
    MemoryAvailable,
    MemoryTotal,
    SwapUsed,
    Load1,
    Load5,
    Load15,
}

impl SysCounter {
    fn parse(name: &str) -> Option<Self> {
        let counter = match name {
            "cpu.usage" => SysCounter::CpuUsage,
            "memory.used" => SysCounter::MemoryUsed,
            "memory.available" => SysCounter::MemoryAvailable,
            "memory.total" => SysCounter::MemoryTotal,
            "swap.used" => SysCounter::SwapUsed,
            "load.1" => SysCounter::Load1,
            "load.5" => SysCounter::Load5,
            "load.15" => SysCounter::Load15,
            other => {
                if let Some(core) = other.strip_prefix("cpu.usage.") {
                    SysCounter::CoreUsage(core.parse().ok()?)
                } else if let Some(core) = other.strip_prefix("cpu.frequency.") {
                    SysCounter::CoreFrequency(core.parse().ok()?)
                } else {
                    return None;
                }
            }
        };
        Some(counter)
    }

    fn is_cpu(&self) -> bool {
        matches!(
            self,
            SysCounter::CpuUsage | SysCounter::CoreUsage(_) | SysCounter::CoreFrequency(_)
        )
    }
}

/// CounterBackend over `sysinfo`
pub struct SysinfoCounters {
    system: Option<System>,
}

impl SysinfoCounters {
    pub fn new() -> Self {
        Self { system: None }
    }

    fn system(&mut self) -> &mut System {
        self.system.get_or_insert_with(|| {
            let mut system = System::new();
            system.refresh_cpu_usage();
            system
        })
    }
}

impl Default for SysinfoCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterBackend for SysinfoCounters {
    fn resolve(&mut self, name: &str) -> bool {
        match SysCounter::parse(name) {
            Some(SysCounter::CoreUsage(core)) | Some(SysCounter::CoreFrequency(core)) => {
                core < self.system().cpus().len()
            }
            Some(_) => true,
            None => false,
        }
    }

    fn collect(&mut self) {
        let system = self.system();
        system.refresh_cpu_usage();
        system.refresh_cpu_frequency();
        system.refresh_memory();
    }

    fn value(&self, name: &str) -> Option<f64> {
        let counter = SysCounter::parse(name)?;
        let system = self.system.as_ref()?;
        if counter.is_cpu() && system.cpus().is_empty() {
            return None;
        }

        let value = match counter {
            SysCounter::CpuUsage => system.global_cpu_usage() as f64,
            SysCounter::CoreUsage(core) => system.cpus().get(core)?.cpu_usage() as f64,
            SysCounter::CoreFrequency(core) => system.cpus().get(core)?.frequency() as f64,
            SysCounter::MemoryUsed => system.used_memory() as f64,
            SysCounter::MemoryAvailable => system.available_memory() as f64,
            SysCounter::MemoryTotal => system.total_memory() as f64,
            SysCounter::SwapUsed => system.used_swap() as f64,
            SysCounter::Load1 => System::load_average().one,
            SysCounter::Load5 => System::load_average().five,
            SysCounter::Load15 => System::load_average().fifteen,
        };
        Some(value)
    }

    fn release(&mut self) {
        self.system = None;
    }
}

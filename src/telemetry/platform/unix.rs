/*!
 * Unix Timer Resolution
 *
 * The closest analogue of the Windows timer resolution is the granularity
 * of the coarse monotonic clock, which ticks at the scheduler rate.
 */

use crate::core::errors::{SourceError, SourceResult};
use crate::telemetry::timer::TimerClock;
use nix::time::{clock_getres, ClockId};

/// Monotonic clock resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    fn clock_id() -> ClockId {
        #[cfg(target_os = "linux")]
        {
            ClockId::CLOCK_MONOTONIC_COARSE
        }
        #[cfg(not(target_os = "linux"))]
        {
            ClockId::CLOCK_MONOTONIC
        }
    }
}

impl TimerClock for MonotonicClock {
    fn resolution_ms(&mut self) -> SourceResult<f64> {
        let res = clock_getres(Self::clock_id())
            .map_err(|e| SourceError::read_failed(format!("clock_getres: {}", e)))?;
        Ok(res.tv_sec() as f64 * 1000.0 + res.tv_nsec() as f64 / 1_000_000.0)
    }
}

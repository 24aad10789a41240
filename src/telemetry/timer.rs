/*!
 * Timer Resolution Source
 */

use super::sample::TelemetrySample;
use super::{Capability, SampleContext, TelemetrySource};
use crate::core::errors::SourceResult;

/// System timer resolution query
pub trait TimerClock: Send {
    /// Current resolution in milliseconds
    fn resolution_ms(&mut self) -> SourceResult<f64>;
}

/// Timer resolution TelemetrySource
pub struct TimerResolutionSource {
    clock: Box<dyn TimerClock>,
}

impl TimerResolutionSource {
    pub fn new(clock: Box<dyn TimerClock>) -> Self {
        Self { clock }
    }
}

impl TelemetrySource for TimerResolutionSource {
    fn capability(&self) -> Capability {
        Capability::TimerResolution
    }

    fn sample(&mut self, _ctx: &SampleContext, out: &mut Vec<TelemetrySample>) -> SourceResult<()> {
        let ms = self.clock.resolution_ms()?;
        out.push(TelemetrySample::TimerResolution { ms });
        Ok(())
    }
}

/*!
 * CPU Power Source
 *
 * Reads the energy library's MSR records each pass and turns them into
 * frequency, power and temperature samples. Records are
 * (name, function, data[3]):
 *
 * - Frequency:   data[0] = MHz
 * - Power:       data[0] = watts, data[1] = cumulative joules
 * - Temperature: data[0] = degrees C
 * - MaxPower and unknown functions are ignored
 */

use super::sample::TelemetrySample;
use super::{Capability, SampleContext, SessionConfig, TelemetrySource};
use crate::core::errors::{SourceError, SourceResult};
use crate::core::limits::POWER_ROUNDING;
use tracing::trace;

/// MSR function id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrFunction {
    Frequency,
    Power,
    Temperature,
    MaxPower,
    Other(i32),
}

impl MsrFunction {
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => MsrFunction::Frequency,
            1 => MsrFunction::Power,
            2 => MsrFunction::Temperature,
            3 => MsrFunction::MaxPower,
            other => MsrFunction::Other(other),
        }
    }
}

/// One MSR record from a single read
#[derive(Debug, Clone, PartialEq)]
pub struct MsrReading {
    pub name: String,
    pub function: MsrFunction,
    pub data: [f64; 3],
}

impl MsrReading {
    pub fn new(name: impl Into<String>, function: MsrFunction, data: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            function,
            data,
        }
    }
}

/// Source of MSR records
pub trait EnergyReader: Send {
    /// One-time initialization; failure makes the reader unusable
    fn initialize(&mut self) -> SourceResult<()>;

    /// Package temperature limit reported with every temperature sample
    fn max_temperature(&self) -> f64;

    /// Take a fresh reading of every MSR
    fn read(&mut self) -> SourceResult<Vec<MsrReading>>;
}

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    (value * POWER_ROUNDING).round() / POWER_ROUNDING
}

enum ReaderState {
    Uninitialized(Box<dyn EnergyReader>),
    Ready(Box<dyn EnergyReader>),
    Cleared,
}

/// CPU energy TelemetrySource
pub struct CpuPowerSource {
    reader: ReaderState,
}

impl CpuPowerSource {
    pub fn new(reader: Box<dyn EnergyReader>) -> Self {
        Self {
            reader: ReaderState::Uninitialized(reader),
        }
    }
}

impl TelemetrySource for CpuPowerSource {
    fn capability(&self) -> Capability {
        Capability::CpuPower
    }

    fn open(&mut self, _config: &SessionConfig) -> SourceResult<()> {
        match std::mem::replace(&mut self.reader, ReaderState::Cleared) {
            ReaderState::Uninitialized(mut reader) => match reader.initialize() {
                Ok(()) => {
                    self.reader = ReaderState::Ready(reader);
                    Ok(())
                }
                Err(e) => {
                    trace!(error = %e, "Energy reader cleared");
                    Err(SourceError::unavailable(e.to_string()))
                }
            },
            ready @ ReaderState::Ready(_) => {
                self.reader = ready;
                Ok(())
            }
            ReaderState::Cleared => Err(SourceError::unavailable("energy reader not available")),
        }
    }

    fn sample(&mut self, _ctx: &SampleContext, out: &mut Vec<TelemetrySample>) -> SourceResult<()> {
        let reader = match &mut self.reader {
            ReaderState::Ready(reader) => reader,
            _ => return Err(SourceError::unavailable("energy reader not initialized")),
        };

        let max_temperature = reader.max_temperature();
        for msr in reader.read()? {
            match msr.function {
                MsrFunction::Frequency => out.push(TelemetrySample::Frequency {
                    name: msr.name,
                    mhz: msr.data[0],
                }),
                MsrFunction::Power => out.push(TelemetrySample::Power {
                    name: msr.name,
                    watts: round4(msr.data[0]),
                    joules: round4(msr.data[1]),
                }),
                MsrFunction::Temperature => out.push(TelemetrySample::Temperature {
                    name: msr.name,
                    celsius: msr.data[0],
                    max_celsius: max_temperature,
                }),
                MsrFunction::MaxPower | MsrFunction::Other(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MonitorMode;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedReader {
        init: SourceResult<()>,
        inits: Arc<AtomicUsize>,
        records: Vec<MsrReading>,
    }

    impl EnergyReader for ScriptedReader {
        fn initialize(&mut self) -> SourceResult<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            self.init.clone()
        }

        fn max_temperature(&self) -> f64 {
            100.0
        }

        fn read(&mut self) -> SourceResult<Vec<MsrReading>> {
            Ok(self.records.clone())
        }
    }

    fn ctx() -> SampleContext {
        SampleContext {
            sample_number: 0,
            mode: MonitorMode::Light,
        }
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(-0.000_04), -0.0);
    }

    #[test]
    fn test_records_map_to_samples() {
        let inits = Arc::new(AtomicUsize::new(0));
        let mut source = CpuPowerSource::new(Box::new(ScriptedReader {
            init: Ok(()),
            inits: inits.clone(),
            records: vec![
                MsrReading::new("Processor", MsrFunction::Frequency, [2400.0, 0.0, 0.0]),
                MsrReading::new("Processor", MsrFunction::Power, [3.141_59, 27.182_81, 7.5]),
                MsrReading::new("Package", MsrFunction::Temperature, [55.0, 0.0, 0.0]),
                MsrReading::new("Package", MsrFunction::MaxPower, [35.0, 0.0, 0.0]),
                MsrReading::new("Mystery", MsrFunction::from_id(9), [1.0, 2.0, 3.0]),
            ],
        }));

        source.open(&SessionConfig::default()).unwrap();
        source.open(&SessionConfig::default()).unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        let mut out = Vec::new();
        source.sample(&ctx(), &mut out).unwrap();
        assert_eq!(
            out,
            vec![
                TelemetrySample::Frequency {
                    name: "Processor".into(),
                    mhz: 2400.0
                },
                TelemetrySample::Power {
                    name: "Processor".into(),
                    watts: 3.1416,
                    joules: 27.1828
                },
                TelemetrySample::Temperature {
                    name: "Package".into(),
                    celsius: 55.0,
                    max_celsius: 100.0
                },
            ]
        );
    }

    #[test]
    fn test_failed_initialize_clears_reader() {
        let inits = Arc::new(AtomicUsize::new(0));
        let mut source = CpuPowerSource::new(Box::new(ScriptedReader {
            init: Err(SourceError::read_failed("init failed")),
            inits: inits.clone(),
            records: Vec::new(),
        }));

        assert!(matches!(
            source.open(&SessionConfig::default()),
            Err(SourceError::Unavailable(_))
        ));
        assert!(matches!(
            source.open(&SessionConfig::default()),
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        let mut out = Vec::new();
        assert!(source.sample(&ctx(), &mut out).is_err());
        assert!(out.is_empty());
    }
}

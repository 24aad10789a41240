/*!
 * Trace Helper Library
 * Child-process supervision with captured output, periodic system
 * telemetry sampling and optional input logging
 */

pub mod core;
pub mod input;
pub mod ipc;
pub mod monitoring;
pub mod process;
pub mod telemetry;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::Settings;
pub use input::{ChannelHook, InputEvent, InputHook, InputLogState, InputLogger, InputRecord};
pub use ipc::{OutputBuffer, PipeChannel};
pub use monitoring::{init_tracing, EventSink, JsonLinesSink, MemorySink, SinkEvent, TracingSink};
pub use process::{ChildProcess, ChildProcessBuilder};
pub use telemetry::{MonitorMode, MonitorState, SamplingMonitor, TelemetrySample, TelemetrySource};

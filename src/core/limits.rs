/*!
 * System Limits and Constants
 *
 * Centralized location for buffer sizes, sampling intervals and caps.
 * Organized by subsystem.
 */

use std::time::Duration;

// =============================================================================
// CHANNEL / OUTPUT CAPTURE
// =============================================================================

/// Logical name of the output-capture channel
/// The OS endpoint appends the process id and an instance sequence number
pub const DEFAULT_CHANNEL_NAME: &str = "trace-helper-pipe";

/// Channel buffering in each direction (16KB)
pub const PIPE_BUFFER_SIZE: usize = 16 * 1024;

/// Chunk size for a single drain read (1KB)
pub const DRAIN_CHUNK_SIZE: usize = 1024;

/// Maximum instances of one channel endpoint
pub const PIPE_MAX_INSTANCES: u32 = 1;

// =============================================================================
// SAMPLING
// =============================================================================

/// Sampling interval while a trace is being recorded
/// Roughly 20 context switches per second, acceptable only while tracing
pub const HEAVY_SAMPLING_INTERVAL: Duration = Duration::from_millis(200);

/// Sampling interval while idle
pub const LIGHT_SAMPLING_INTERVAL: Duration = Duration::from_millis(1000);

/// Upper bound on enumerated batteries per pass
pub const MAX_BATTERIES: usize = 5;

/// Power and energy values are rounded to 1/POWER_ROUNDING
pub const POWER_ROUNDING: f64 = 10_000.0;

/// Maximum length of an energy-library MSR name (UTF-16 units)
pub const MSR_NAME_CAPACITY: usize = 1024;

// =============================================================================
// UNIT CONVERSIONS
// =============================================================================

/// Windows timer resolution unit (100ns) expressed in milliseconds
pub const TIMER_UNITS_TO_MS: f64 = 1e-4;

/// Battery rates are reported in milliwatts
pub const MILLIWATTS_PER_WATT: f64 = 1000.0;

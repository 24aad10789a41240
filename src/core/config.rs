/*!
 * Settings
 *
 * Runtime configuration for the supervisor, the sampling monitor and the
 * input logger.
 *
 * Environment variables:
 * - TRACE_HELPER_MONITOR_MODE: `heavy` or `light` (default: light)
 * - TRACE_HELPER_PERF_COUNTERS: `;`-delimited counter identifiers
 * - TRACE_HELPER_ECHO_COMMANDS: echo spawned command lines (default: false)
 * - TRACE_HELPER_PRINT_EXIT_CODES: report non-zero child exits (default: true)
 * - TRACE_HELPER_INPUT_LOGGING: `off`, `anonymized` or `full` (default: off)
 * - TRACE_HELPER_TRACE_JSON: JSON log output (default: false)
 */

use crate::input::InputLogState;
use crate::telemetry::MonitorMode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

pub const ENV_MONITOR_MODE: &str = "TRACE_HELPER_MONITOR_MODE";
pub const ENV_PERF_COUNTERS: &str = "TRACE_HELPER_PERF_COUNTERS";
pub const ENV_ECHO_COMMANDS: &str = "TRACE_HELPER_ECHO_COMMANDS";
pub const ENV_PRINT_EXIT_CODES: &str = "TRACE_HELPER_PRINT_EXIT_CODES";
pub const ENV_INPUT_LOGGING: &str = "TRACE_HELPER_INPUT_LOGGING";
pub const ENV_TRACE_JSON: &str = "TRACE_HELPER_TRACE_JSON";

/// Configuration inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    pub monitor_mode: MonitorMode,
    pub perf_counters: String,
    pub record_trace_command: bool,
    pub print_failed_exit_codes: bool,
    pub input_logging: InputLogState,
    pub trace_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_mode: MonitorMode::Light,
            perf_counters: String::new(),
            record_trace_command: false,
            print_failed_exit_codes: true,
            input_logging: InputLogState::Off,
            trace_json: false,
        }
    }
}

impl Settings {
    /// Read settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            monitor_mode: parse_env(ENV_MONITOR_MODE).unwrap_or(defaults.monitor_mode),
            perf_counters: std::env::var(ENV_PERF_COUNTERS).unwrap_or(defaults.perf_counters),
            record_trace_command: env_flag(ENV_ECHO_COMMANDS)
                .unwrap_or(defaults.record_trace_command),
            print_failed_exit_codes: env_flag(ENV_PRINT_EXIT_CODES)
                .unwrap_or(defaults.print_failed_exit_codes),
            input_logging: parse_env(ENV_INPUT_LOGGING).unwrap_or(defaults.input_logging),
            trace_json: env_flag(ENV_TRACE_JSON).unwrap_or(defaults.trace_json),
        }
    }

    /// Counter identifiers from the `;`-delimited list
    pub fn perf_counter_list(&self) -> Vec<String> {
        split_counter_list(&self.perf_counters)
    }
}

/// Split a `;`-delimited counter list, trimming and dropping empty entries
pub fn split_counter_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid setting");
            None
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid boolean setting");
            None
        }
    }
}

/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output-capture channel errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ChannelError {
    #[error("Failed to create channel {name}: {reason}")]
    #[diagnostic(
        code(channel::create_failed),
        help("Another instance may own the endpoint, or the temp directory is not writable.")
    )]
    CreateFailed { name: String, reason: String },

    #[error("Cannot connect to channel {name}: {reason}")]
    #[diagnostic(
        code(channel::connection),
        help("The channel accepts exactly one writer and must still be listening.")
    )]
    Connection { name: String, reason: String },

    #[error("Channel {0} is closed")]
    #[diagnostic(code(channel::closed))]
    Closed(String),
}

/// Child-process supervisor errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SupervisorError {
    #[error("Output pipe unavailable: {0}")]
    #[diagnostic(
        code(supervisor::pipe_unavailable),
        help("The output channel could not be created or already has a writer attached.")
    )]
    PipeUnavailable(String),

    #[error("Error {code} starting {path}, {args}")]
    #[diagnostic(
        code(supervisor::spawn_failed),
        help("Check that the executable exists and is runnable.")
    )]
    SpawnFailed {
        code: i32,
        path: String,
        args: String,
    },

    #[error("Process already started on this supervisor")]
    #[diagnostic(
        code(supervisor::already_started),
        help("A supervisor runs exactly one child process. Create a new one.")
    )]
    AlreadyStarted,

    #[error("Failed to start supervisor thread: {0}")]
    #[diagnostic(code(supervisor::thread_spawn))]
    ThreadSpawn(String),
}

impl From<ChannelError> for SupervisorError {
    fn from(err: ChannelError) -> Self {
        SupervisorError::PipeUnavailable(err.to_string())
    }
}

/// Telemetry source errors
///
/// Both variants are swallowed by the sampling loop.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SourceError {
    #[error("Subsystem unavailable: {0}")]
    #[diagnostic(code(telemetry::unavailable))]
    Unavailable(String),

    #[error("Sample read failed: {0}")]
    #[diagnostic(code(telemetry::read_failed))]
    ReadFailed(String),
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable(reason.into())
    }

    pub fn read_failed(reason: impl Into<String>) -> Self {
        SourceError::ReadFailed(reason.into())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SourceError::Unavailable(err.to_string())
            }
            _ => SourceError::ReadFailed(err.to_string()),
        }
    }
}

/// Sampling monitor errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MonitorError {
    #[error("Sampling threads already running")]
    #[diagnostic(
        code(monitor::already_running),
        help("Call stop_threads() before starting again or changing counters.")
    )]
    AlreadyRunning,

    #[error("Failed to start sampling thread: {0}")]
    #[diagnostic(code(monitor::thread_spawn))]
    ThreadSpawn(String),
}

/// Input-logging session errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum InputError {
    #[error("Input hook unavailable: {0}")]
    #[diagnostic(
        code(input::hook_unavailable),
        help("Keyboard and mouse hooks need an interactive desktop session.")
    )]
    HookUnavailable(String),

    #[error("Failed to start input logger thread: {0}")]
    #[diagnostic(code(input::thread_spawn))]
    ThreadSpawn(String),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
pub type SupervisorResult<T> = Result<T, SupervisorError>;
pub type SourceResult<T> = Result<T, SourceError>;
pub type MonitorResult<T> = Result<T, MonitorError>;
pub type InputResult<T> = Result<T, InputError>;

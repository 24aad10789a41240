/*!
 * Pipe Channel
 *
 * Single-writer byte channel between a child process and its supervisor.
 * The reader side is owned by the drain thread; writers are the child's
 * redirected standard streams.
 *
 * Lifecycle: Created -> AwaitingConnection -> Connected -> Closed
 */

use super::platform::{self, Endpoint, Listener};
use crate::core::errors::{ChannelError, ChannelResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Per-process instance counter keeping endpoints unique
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Created,
    AwaitingConnection,
    Connected,
    Closed,
}

/// Listening byte channel with capacity for exactly one writer
///
/// Shared between the supervisor and its drain thread through an `Arc`.
pub struct PipeChannel {
    name: String,
    endpoint: Endpoint,
    state: Mutex<ChannelState>,
    listener: Mutex<Option<Arc<Listener>>>,
    attached: AtomicBool,
}

impl PipeChannel {
    /// Bind a new listening endpoint derived from `name`
    pub fn create(name: &str) -> ChannelResult<Self> {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let endpoint = platform::endpoint_for(name, std::process::id(), sequence);
        let listener = Listener::bind(&endpoint).map_err(|e| ChannelError::CreateFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        debug!(channel = name, sequence, "Channel created");
        Ok(Self {
            name: name.to_string(),
            endpoint,
            state: Mutex::new(ChannelState::Created),
            listener: Mutex::new(Some(Arc::new(listener))),
            attached: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Open the writer end
    ///
    /// Fails with `Connection` when no listener is pending or a writer is
    /// already attached. The Unix listen backlog would queue a second
    /// writer before `accept`, so capacity is enforced here.
    pub fn connect(&self) -> ChannelResult<ChannelWriter> {
        if self.state() == ChannelState::Closed {
            return Err(ChannelError::Closed(self.name.clone()));
        }
        if self.attached.swap(true, Ordering::AcqRel) {
            return Err(ChannelError::Connection {
                name: self.name.clone(),
                reason: "a writer is already attached".to_string(),
            });
        }
        platform::connect(&self.endpoint)
            .map(ChannelWriter)
            .map_err(|e| {
                self.attached.store(false, Ordering::Release);
                ChannelError::Connection {
                    name: self.name.clone(),
                    reason: e.to_string(),
                }
            })
    }

    /// Whether `connect` has handed out the writer end
    pub fn has_writer(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Block until a writer attaches, then stop accepting further writers
    pub fn accept(&self) -> ChannelResult<ChannelReader> {
        let listener = self
            .listener
            .lock()
            .clone()
            .ok_or_else(|| ChannelError::Closed(self.name.clone()))?;

        {
            let mut state = self.state.lock();
            if *state == ChannelState::Created {
                *state = ChannelState::AwaitingConnection;
            }
        }
        let reader = listener.accept().map_err(|e| ChannelError::Connection {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        listener.stop_accepting();

        let mut state = self.state.lock();
        if *state == ChannelState::AwaitingConnection {
            *state = ChannelState::Connected;
        }
        drop(state);

        debug!(channel = %self.name, "Writer connected");
        Ok(ChannelReader(reader))
    }

    /// Reader-side disconnect, performed by the drain once its reads end
    pub fn disconnect(&self) {
        if let Some(listener) = self.listener.lock().as_ref() {
            listener.disconnect();
        }
        self.set_state(ChannelState::Closed);
        debug!(channel = %self.name, "Channel disconnected");
    }

    /// Unblock a reader still waiting in `accept` by attaching a writer that
    /// closes immediately
    pub fn release_pending(&self) {
        match self.state() {
            ChannelState::Created | ChannelState::AwaitingConnection => {
                if let Err(e) = platform::connect(&self.endpoint) {
                    debug!(channel = %self.name, error = %e, "No pending accept to release");
                }
            }
            ChannelState::Connected | ChannelState::Closed => {}
        }
    }

    /// Release the listening endpoint (idempotent)
    ///
    /// On Unix this also wakes a reader blocked in `accept`, which then
    /// fails, so teardown completes even when no writer can attach.
    pub fn close(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.stop_accepting();
            self.set_state(ChannelState::Closed);
            debug!(channel = %self.name, "Channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.listener.lock().is_none()
    }

    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeChannel")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Writer end of a channel
pub struct ChannelWriter(platform::Writer);

impl ChannelWriter {
    /// Duplicate the underlying handle
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self(self.0.try_clone()?))
    }

    /// Hand the handle to a child process as a standard stream
    pub fn into_stdio(self) -> Stdio {
        self.0.into_stdio()
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl std::fmt::Debug for ChannelWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChannelWriter")
    }
}

/// Reader end of a channel
pub struct ChannelReader(platform::Reader);

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

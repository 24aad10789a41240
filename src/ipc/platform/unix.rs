/*!
 * Unix Channel Endpoint
 * Domain stream socket with best-effort 16KB buffering
 */

use crate::core::limits::PIPE_BUFFER_SIZE;
use nix::sys::socket::{self, setsockopt, sockopt};
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::debug;

pub(crate) type Endpoint = PathBuf;
pub(crate) type Reader = UnixStream;

/// Socket path for a channel instance
pub(crate) fn endpoint_for(name: &str, pid: u32, sequence: u64) -> Endpoint {
    std::env::temp_dir().join(format!("{}-{}-{}.sock", name, pid, sequence))
}

/// Listening side of the channel
pub(crate) struct Listener {
    listener: UnixListener,
    path: PathBuf,
}

impl Listener {
    pub(crate) fn bind(path: &Endpoint) -> io::Result<Self> {
        // A leftover file from a dead process would make bind fail
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.clone(),
        })
    }

    /// Block until a writer attaches
    pub(crate) fn accept(&self) -> io::Result<Reader> {
        let (stream, _) = self.listener.accept()?;
        if let Err(e) = setsockopt(&stream, sockopt::RcvBuf, &PIPE_BUFFER_SIZE) {
            debug!(error = %e, "Could not size receive buffer");
        }
        Ok(stream)
    }

    /// Refuse further writers
    ///
    /// Unlinking the path stops new connections. Shutting the socket down
    /// wakes any thread still blocked in `accept` (Linux), which holds its
    /// own reference to this listener.
    pub(crate) fn stop_accepting(&self) {
        let _ = std::fs::remove_file(&self.path);
        if let Err(e) = socket::shutdown(self.listener.as_raw_fd(), socket::Shutdown::Both) {
            debug!(error = %e, "Listener shutdown failed");
        }
    }

    /// Reader-side disconnect (the stream itself closes on drop)
    pub(crate) fn disconnect(&self) {}
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop_accepting();
    }
}

/// Writing side of the channel
pub(crate) struct Writer(UnixStream);

pub(crate) fn connect(path: &Endpoint) -> io::Result<Writer> {
    let stream = UnixStream::connect(path)?;
    // Write-only: a child reading its stdin from this end sees EOF
    stream.shutdown(Shutdown::Read)?;
    if let Err(e) = setsockopt(&stream, sockopt::SndBuf, &PIPE_BUFFER_SIZE) {
        debug!(error = %e, "Could not size send buffer");
    }
    Ok(Writer(stream))
}

impl Writer {
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(Self(self.0.try_clone()?))
    }

    pub(crate) fn into_stdio(self) -> Stdio {
        Stdio::from(OwnedFd::from(self.0))
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

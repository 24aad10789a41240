/*!
 * Output Drain
 *
 * Dedicated reader thread: waits for the channel's writer, then copies
 * every chunk it reads into the shared OutputBuffer and raises the
 * "new output" signal. When reads stop (writer closed or error) the
 * thread disconnects the channel and exits.
 */

use super::buffer::OutputBuffer;
use super::channel::PipeChannel;
use crate::core::limits::DRAIN_CHUNK_SIZE;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Counters reported when the drain thread is joined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub bytes: u64,
    pub reads: u64,
}

/// Handle to the drain thread
#[derive(Debug)]
pub struct OutputDrain {
    handle: Option<JoinHandle<DrainStats>>,
}

impl OutputDrain {
    /// Start draining `channel` into `buffer`
    ///
    /// `notify` runs after each chunk is appended. It is an edge signal:
    /// several appends may be observed through a single wake.
    pub fn spawn<F>(
        channel: Arc<PipeChannel>,
        buffer: Arc<OutputBuffer>,
        notify: F,
    ) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("child-process-listener".to_string())
            .spawn(move || drain_loop(&channel, &buffer, notify))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the thread to exit; `None` once already joined
    pub fn join(&mut self) -> Option<DrainStats> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                debug!("Drain thread panicked");
                Some(DrainStats::default())
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

fn drain_loop<F: Fn()>(channel: &PipeChannel, buffer: &OutputBuffer, notify: F) -> DrainStats {
    let mut stats = DrainStats::default();

    match channel.accept() {
        Ok(mut reader) => {
            let mut chunk = [0u8; DRAIN_CHUNK_SIZE];
            let mut decoder = Utf8Decoder::new();
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        stats.bytes += n as u64;
                        stats.reads += 1;
                        buffer.append(&decoder.decode(&chunk[..n]));
                        notify();
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "Channel read ended");
                        break;
                    }
                }
            }

            let tail = decoder.finish();
            if !tail.is_empty() {
                buffer.append(&tail);
                notify();
            }
        }
        Err(e) => debug!(error = %e, "Connect failed"),
    }

    channel.disconnect();
    debug!(bytes = stats.bytes, reads = stats.reads, "Drain finished");
    stats
}

/// Incremental UTF-8 decoder
///
/// A multi-byte sequence split across chunks is held back until the rest
/// arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning all text that is complete so far
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = &input[..];
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still held back
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

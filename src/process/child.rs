/*!
 * Child Process Supervisor
 *
 * Runs one executable with stdout, stderr and stdin all bound to the
 * writer end of a private PipeChannel. A drain thread collects output into
 * an OutputBuffer while the caller waits or does other work.
 *
 * Threads per supervisor:
 * - `child-process-listener`: the OutputDrain, started at construction
 * - `child-process-exit`: owns the OS child and raises the exit signal
 *
 * Teardown (`wait_for_completion`) runs every step behind its own
 * released-yet check, so it may be entered any number of times and from
 * any state, including when no process was ever started.
 */

use super::command_line;
use crate::core::errors::{SupervisorError, SupervisorResult};
use crate::core::guard::{Guard, ReleaseOnce};
use crate::core::limits::DEFAULT_CHANNEL_NAME;
use crate::core::sync::{Wake, WaitSet};
use crate::ipc::{ChannelWriter, OutputBuffer, OutputDrain, PipeChannel};
use crate::monitoring::{EventSink, TracingSink};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Supervisor for a single child process
pub struct ChildProcess {
    exe: String,
    sink: Arc<dyn EventSink>,
    print_failed_exit_codes: bool,

    channel: Option<Arc<PipeChannel>>,
    channel_error: Option<String>,
    buffer: Arc<OutputBuffer>,
    signals: Arc<WaitSet>,
    drain: Option<OutputDrain>,

    stdout: ReleaseOnce<ChannelWriter>,
    stderr: ReleaseOnce<ChannelWriter>,
    stdin: ReleaseOnce<ChannelWriter>,
    writer_opened: bool,

    exit_watch: Option<JoinHandle<i32>>,
    exit_code: Option<i32>,
    pid: Option<u32>,
    run_attempted: bool,
}

impl ChildProcess {
    pub fn builder(exe: impl Into<String>) -> ChildProcessBuilder {
        ChildProcessBuilder::new(exe)
    }

    /// Supervisor for `exe` writing echoed text to `sink`
    pub fn new(exe: impl Into<String>, sink: Arc<dyn EventSink>) -> Self {
        Self::builder(exe).with_sink(sink).build()
    }

    fn from_builder(builder: ChildProcessBuilder) -> Self {
        let buffer = Arc::new(OutputBuffer::new());
        let signals = Arc::new(WaitSet::new());

        let (channel, drain, channel_error) = match PipeChannel::create(&builder.channel_name) {
            Ok(channel) => {
                let channel = Arc::new(channel);
                let notify = {
                    let signals = signals.clone();
                    move || signals.notify_output()
                };
                match OutputDrain::spawn(channel.clone(), buffer.clone(), notify) {
                    Ok(drain) => (Some(channel), Some(drain), None),
                    Err(e) => {
                        warn!(error = %e, "Failed to start output drain");
                        (None, None, Some(e.to_string()))
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to create output channel");
                (None, None, Some(e.to_string()))
            }
        };

        Self {
            exe: builder.exe,
            sink: builder
                .sink
                .unwrap_or_else(|| Arc::new(TracingSink::with_console()) as Arc<dyn EventSink>),
            print_failed_exit_codes: builder.print_failed_exit_codes,
            channel,
            channel_error,
            buffer,
            signals,
            drain,
            stdout: ReleaseOnce::empty("stdout"),
            stderr: ReleaseOnce::empty("stderr"),
            stdin: ReleaseOnce::empty("stdin"),
            writer_opened: false,
            exit_watch: None,
            exit_code: None,
            pid: None,
            run_attempted: false,
        }
    }

    pub fn exe(&self) -> &str {
        &self.exe
    }

    /// OS process id, once started
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_started(&self) -> bool {
        self.pid.is_some()
    }

    /// Spawn the executable with `args` as the argument portion of its
    /// command line
    ///
    /// May be attempted once per supervisor; a second call fails with
    /// `AlreadyStarted` whatever the outcome of the first.
    pub fn run(&mut self, show_command: bool, args: &str) -> SupervisorResult<()> {
        if self.run_attempted {
            return Err(SupervisorError::AlreadyStarted);
        }
        self.run_attempted = true;

        if show_command {
            self.sink.output(&command_line::display(&self.exe, args));
        }

        let channel = self.channel.clone().ok_or_else(|| {
            SupervisorError::PipeUnavailable(
                self.channel_error
                    .clone()
                    .unwrap_or_else(|| "channel closed".to_string()),
            )
        })?;

        let stdout = channel.connect()?;
        self.writer_opened = true;
        let stderr = stdout.try_clone().map_err(pipe_unavailable)?;
        let stdin = stdout.try_clone().map_err(pipe_unavailable)?;
        self.stdout = ReleaseOnce::new("stdout", stdout);
        self.stderr = ReleaseOnce::new("stderr", stderr);
        self.stdin = ReleaseOnce::new("stdin", stdin);

        let mut command = Command::new(&self.exe);
        command_line::apply(&mut command, args);
        command
            .stdout(child_stdio(&self.stdout)?)
            .stderr(child_stdio(&self.stderr)?)
            .stdin(child_stdio(&self.stdin)?);

        let spawned = command.spawn();
        // The command holds the child's copies of the handles
        drop(command);

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let code = e.raw_os_error().unwrap_or(-1);
                warn!(exe = %self.exe, code, error = %e, "Failed to start process");
                self.sink
                    .output(&format!("Error {} starting {}, {}\n", code, self.exe, args));
                return Err(SupervisorError::SpawnFailed {
                    code,
                    path: self.exe.clone(),
                    args: args.to_string(),
                });
            }
        };

        let pid = child.id();
        let signals = self.signals.clone();
        let exit_watch = thread::Builder::new()
            .name("child-process-exit".to_string())
            .spawn(move || {
                let code = match child.wait() {
                    Ok(status) => exit_status_code(status),
                    Err(e) => {
                        debug!(pid, error = %e, "Wait on child failed");
                        -1
                    }
                };
                signals.notify_exited();
                code
            })
            .map_err(|e| SupervisorError::ThreadSpawn(e.to_string()))?;

        debug!(exe = %self.exe, pid, "Process started");
        self.exit_watch = Some(exit_watch);
        self.pid = Some(pid);
        Ok(())
    }

    /// Block until the process exits or new output arrives
    ///
    /// Returns `false` only when woken by process exit, so a loop around
    /// this call doubles as an idle wait for output. Without a started
    /// process it returns `false` immediately.
    pub fn is_still_running(&self) -> bool {
        if self.pid.is_none() || self.exit_code.is_some() {
            return false;
        }
        self.signals.wait_any() == Wake::Output
    }

    /// Take and clear all buffered output text
    pub fn remove_output_text(&self) -> String {
        self.buffer.take()
    }

    /// Wait for exit, echoing output as it arrives, then report the exit
    /// status; 0 if no process was started
    pub fn exit_code(&mut self) -> i32 {
        if self.pid.is_none() {
            return 0;
        }
        self.wait_for_completion(true);
        self.exit_code.unwrap_or_default()
    }

    /// Wait for exit without echoing, then return the remaining output;
    /// empty if no process was started
    pub fn output(&mut self) -> String {
        if self.pid.is_none() {
            return String::new();
        }
        self.wait_for_completion(false);
        self.remove_output_text()
    }

    /// Wait for the process to finish and release every resource
    pub fn wait_for_completion(&mut self, echo: bool) {
        if self.pid.is_some() {
            while self.is_still_running() {
                if echo {
                    self.echo_output();
                }
            }
            if let Some(exit_watch) = self.exit_watch.take() {
                let code = exit_watch.join().unwrap_or_else(|_| {
                    debug!("Exit watch thread panicked");
                    -1
                });
                debug!(exe = %self.exe, code, "Process exited");
                self.exit_code = Some(code);
            }
        }

        // Closing the last writer ends the drain's pending read
        for stream in [&mut self.stderr, &mut self.stdout, &mut self.stdin] {
            if stream.is_active() {
                let _ = stream.release();
            }
        }

        // No writer will ever close on its own: attach a throwaway one, and
        // close the channel in case even that cannot connect
        if let Some(channel) = &self.channel {
            if !self.writer_opened {
                channel.release_pending();
                channel.close();
            }
        }

        if let Some(mut drain) = self.drain.take() {
            if let Some(stats) = drain.join() {
                debug!(bytes = stats.bytes, reads = stats.reads, "Drain joined");
            }
        }

        if let Some(channel) = self.channel.take() {
            channel.close();
        }

        if echo {
            self.echo_output();
        }
    }

    fn echo_output(&self) {
        let text = self.buffer.take();
        if !text.is_empty() {
            self.sink.output(&text);
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.pid.is_some() {
            // Exit codes are reported as the unsigned OS value
            let code = self.exit_code() as u32;
            if self.print_failed_exit_codes && code != 0 {
                self.sink
                    .output(&format!("Process exit code was {:08x} ({})\n", code, code));
            }
        }
        self.wait_for_completion(false);
    }
}

impl std::fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcess")
            .field("exe", &self.exe)
            .field("pid", &self.pid)
            .field("exit_code", &self.exit_code)
            .field("run_attempted", &self.run_attempted)
            .finish()
    }
}

/// Builder for ChildProcess
pub struct ChildProcessBuilder {
    exe: String,
    sink: Option<Arc<dyn EventSink>>,
    channel_name: String,
    print_failed_exit_codes: bool,
}

impl ChildProcessBuilder {
    pub fn new(exe: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            sink: None,
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            print_failed_exit_codes: true,
        }
    }

    /// Destination for echoed commands, output and diagnostics
    /// (default: console)
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Logical channel name used to derive the OS endpoint
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// Report non-zero exit codes when the supervisor is dropped
    pub fn with_print_failed_exit_codes(mut self, enabled: bool) -> Self {
        self.print_failed_exit_codes = enabled;
        self
    }

    /// Create the channel and start the drain thread
    ///
    /// Never fails; channel problems surface from `run` as `PipeUnavailable`.
    pub fn build(self) -> ChildProcess {
        ChildProcess::from_builder(self)
    }
}

fn pipe_unavailable(err: std::io::Error) -> SupervisorError {
    SupervisorError::PipeUnavailable(err.to_string())
}

fn child_stdio(stream: &ReleaseOnce<ChannelWriter>) -> SupervisorResult<Stdio> {
    let writer = stream.get().ok_or_else(|| {
        SupervisorError::PipeUnavailable(format!("{} already released", stream.resource_type()))
    })?;
    writer
        .try_clone()
        .map(ChannelWriter::into_stdio)
        .map_err(pipe_unavailable)
}

fn exit_status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

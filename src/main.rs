/*!
 * Trace Helper - Main Entry Point
 *
 * Samples system telemetry while a child process runs:
 * - Sampling monitor in heavy or light mode
 * - Child output echoed to the console as it arrives
 * - Exits with the child's exit code
 */

use clap::Parser;
use miette::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use trace_helper::core::config::{
    ENV_ECHO_COMMANDS, ENV_MONITOR_MODE, ENV_PERF_COUNTERS, ENV_TRACE_JSON,
};
use trace_helper::process::command_line;
use trace_helper::{
    init_tracing, ChildProcess, EventSink, MonitorMode, SamplingMonitor, Settings, TracingSink,
};

#[derive(Debug, Parser)]
#[command(
    name = "trace-helper",
    version,
    about = "Run a process while sampling power and performance telemetry"
)]
struct Cli {
    /// Sampling profile
    #[arg(long, env = ENV_MONITOR_MODE)]
    mode: Option<MonitorMode>,

    /// `;`-delimited performance counter identifiers
    #[arg(long, env = ENV_PERF_COUNTERS)]
    perf_counters: Option<String>,

    /// Echo the command line before running it
    #[arg(long, env = ENV_ECHO_COMMANDS)]
    echo_command: bool,

    /// Do not report non-zero exit codes
    #[arg(long)]
    no_exit_codes: bool,

    /// JSON log output
    #[arg(long, env = ENV_TRACE_JSON)]
    json: bool,

    /// Seconds to sample when no executable is given
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Executable to run
    exe: Option<String>,

    /// Arguments for the executable
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    /// Flags take precedence over the environment-derived settings
    fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        if let Some(mode) = self.mode {
            settings.monitor_mode = mode;
        }
        if let Some(counters) = &self.perf_counters {
            settings.perf_counters = counters.clone();
        }
        settings.record_trace_command |= self.echo_command;
        if self.no_exit_codes {
            settings.print_failed_exit_codes = false;
        }
        settings.trace_json |= self.json;
        settings
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings();

    init_tracing(settings.trace_json);
    debug!(?settings, "Settings loaded");

    let sink: Arc<dyn EventSink> = Arc::new(TracingSink::with_console());

    let mut monitor = SamplingMonitor::with_default_sources(sink.clone());
    monitor.set_perf_counters(&settings.perf_counters)?;
    monitor.start_threads(settings.monitor_mode)?;
    info!(
        mode = %settings.monitor_mode,
        session_id = monitor.session_id().unwrap_or_default(),
        "Sampling started"
    );

    let exit_code = match &cli.exe {
        Some(exe) => {
            let mut child = ChildProcess::builder(exe.as_str())
                .with_sink(sink.clone())
                .with_print_failed_exit_codes(settings.print_failed_exit_codes)
                .build();
            child.run(settings.record_trace_command, &command_line::join(&cli.args))?;
            let code = child.exit_code();
            drop(child);
            code
        }
        None => {
            std::thread::sleep(Duration::from_secs(cli.duration));
            0
        }
    };

    monitor.stop_threads();
    info!(exit_code, "Done");

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

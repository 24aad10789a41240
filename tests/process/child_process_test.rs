/*!
 * Child Process Tests
 * Spawning, output capture, exit codes and teardown of ChildProcess
 */

use pretty_assertions::assert_eq;
use std::sync::Arc;
use trace_helper::{ChildProcess, MemorySink, SupervisorError};

fn supervisor(exe: &str) -> (ChildProcess, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let child = ChildProcess::new(exe, sink.clone());
    (child, sink)
}

#[test]
fn test_never_run_drop_is_silent() {
    let (child, sink) = supervisor("sh");
    drop(child);
    assert!(sink.is_empty());
}

#[test]
fn test_spawn_failure_reports_error() {
    let (mut child, sink) = supervisor("/no/such/binary");

    let err = child.run(false, "-x").unwrap_err();
    match err {
        SupervisorError::SpawnFailed { code, path, args } => {
            assert_eq!(code, 2);
            assert_eq!(path, "/no/such/binary");
            assert_eq!(args, "-x");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(sink.output_text(), "Error 2 starting /no/such/binary, -x\n");
    assert!(!child.has_started());
    assert_eq!(child.exit_code(), 0);
    drop(child);
    // No exit-code report for a process that never started
    assert_eq!(sink.output_text(), "Error 2 starting /no/such/binary, -x\n");
}

#[test]
fn test_second_run_rejected() {
    let (mut child, _sink) = supervisor("/no/such/binary");
    assert!(child.run(false, "").is_err());
    assert_eq!(child.run(false, ""), Err(SupervisorError::AlreadyStarted));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_captured() {
        let (mut child, sink) = supervisor("sh");
        child.run(false, "-c 'echo hello'").unwrap();

        assert_eq!(child.output(), "hello\n");
        assert_eq!(child.exit_code(), 0);
        drop(child);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_stderr_shares_channel() {
        let (mut child, _sink) = supervisor("sh");
        child.run(false, "-c 'echo out; echo err 1>&2'").unwrap();
        assert_eq!(child.output(), "out\nerr\n");
    }

    #[test]
    fn test_exit_code_echoes_output() {
        let (mut child, sink) = supervisor("sh");
        child.run(false, "-c 'echo a; echo b'").unwrap();

        assert_eq!(child.exit_code(), 0);
        assert_eq!(sink.output_text(), "a\nb\n");
        // Already echoed, nothing left behind
        assert_eq!(child.output(), "");
    }

    #[test]
    fn test_failed_exit_code_reported_on_drop() {
        let (mut child, sink) = supervisor("sh");
        child.run(false, "-c 'exit 42'").unwrap();

        assert_eq!(child.exit_code(), 42);
        drop(child);
        assert_eq!(sink.output_text(), "Process exit code was 0000002a (42)\n");
    }

    #[test]
    fn test_failed_exit_code_report_disabled() {
        let sink = Arc::new(MemorySink::new());
        let mut child = ChildProcess::builder("sh")
            .with_sink(sink.clone())
            .with_print_failed_exit_codes(false)
            .build();
        child.run(false, "-c 'exit 3'").unwrap();

        assert_eq!(child.exit_code(), 3);
        drop(child);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_drop_without_waiting_reports_exit() {
        let (mut child, sink) = supervisor("sh");
        child.run(false, "-c 'echo gone; exit 1'").unwrap();
        drop(child);
        // Drop fetches the exit code with echo enabled
        assert_eq!(
            sink.output_text(),
            "gone\nProcess exit code was 00000001 (1)\n"
        );
    }

    #[test]
    fn test_show_command_echo() {
        let (mut child, sink) = supervisor("sh");
        child.run(true, "-c true").unwrap();
        assert_eq!(child.exit_code(), 0);
        assert_eq!(sink.output_text(), "sh -c true\n");
    }

    #[test]
    fn test_second_run_after_success_rejected() {
        let (mut child, _sink) = supervisor("sh");
        child.run(false, "-c true").unwrap();
        assert_eq!(child.run(false, "-c true"), Err(SupervisorError::AlreadyStarted));
        assert_eq!(child.exit_code(), 0);
    }

    #[test]
    fn test_large_output_in_order() {
        let (mut child, _sink) = supervisor("sh");
        child
            .run(
                false,
                "-c 'i=0; while [ $i -lt 5000 ]; do echo line$i; i=$((i+1)); done'",
            )
            .unwrap();

        let text = child.output();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5000);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(*line, format!("line{}", i));
        }
    }

    #[test]
    fn test_stdin_reads_end_of_file() {
        let (mut child, _sink) = supervisor("cat");
        child.run(false, "").unwrap();
        assert_eq!(child.output(), "");
        assert_eq!(child.exit_code(), 0);
    }

    #[test]
    fn test_polling_loop_collects_everything() {
        let (mut child, _sink) = supervisor("sh");
        child
            .run(false, "-c 'echo one; sleep 0.1; echo two; sleep 0.1; echo three'")
            .unwrap();

        let mut collected = String::new();
        while child.is_still_running() {
            collected.push_str(&child.remove_output_text());
        }
        collected.push_str(&child.output());
        assert_eq!(collected, "one\ntwo\nthree\n");
        assert!(!child.is_still_running());
    }

    #[test]
    fn test_signal_exit_code() {
        let (mut child, _sink) = supervisor("sh");
        child.run(false, "-c 'kill -9 $$'").unwrap();
        assert_eq!(child.exit_code(), 137);
    }

    /// Socket files created for `name` by this test process
    fn endpoints_named(name: &str) -> Vec<std::path::PathBuf> {
        let prefix = format!("{}-{}-", name, std::process::id());
        std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(&prefix) && n.ends_with(".sock"))
            })
            .collect()
    }

    #[test]
    fn test_teardown_completes_when_endpoint_vanished() {
        let sink = Arc::new(MemorySink::new());
        let mut child = ChildProcess::builder("sh")
            .with_sink(sink.clone())
            .with_channel_name("vanished-endpoint")
            .build();

        let endpoints = endpoints_named("vanished-endpoint");
        assert_eq!(endpoints.len(), 1);
        std::fs::remove_file(&endpoints[0]).unwrap();

        // With the endpoint gone no writer can attach, including the
        // throwaway one teardown uses to release the drain
        assert!(matches!(
            child.run(false, "-c true"),
            Err(SupervisorError::PipeUnavailable(_))
        ));

        let (done_tx, done_rx) = flume::bounded(1);
        std::thread::spawn(move || {
            drop(child);
            let _ = done_tx.send(());
        });
        assert!(done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .is_ok());
        assert!(sink.is_empty());
    }
}

/*!
 * Structured Tracing
 * Subscriber setup and session spans using the tracing crate
 *
 * Features:
 * - Compact human-readable output by default
 * - JSON-formatted logs for structured parsing
 * - Named worker threads shown on every line
 * - Session ids for correlating samples across one sampling run
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json, "Structured tracing initialized");
    }
}

/// Generate a unique id for one sampling session
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one sampling session from start to stop
pub struct SessionSpan {
    span: tracing::Span,
    start: Instant,
    session_id: String,
}

impl SessionSpan {
    pub fn new(mode: &str, interval_ms: u64) -> Self {
        let session_id = generate_session_id();

        let span = span!(
            Level::DEBUG,
            "sampling_session",
            session_id = %session_id,
            mode = mode,
            interval_ms = interval_ms,
            samples = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let _entered = span.enter();
        debug!(session_id = %session_id, mode, "session started");
        drop(_entered);

        Self {
            span,
            start: Instant::now(),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record the number of completed sampling passes
    pub fn record_samples(&self, count: u64) {
        self.span.record("samples", count);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SessionSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);
        debug!(
            session_id = %self.session_id,
            duration_ms = duration.as_millis() as u64,
            "session finished"
        );
    }
}

/// Warn when a single sampling pass takes longer than its interval
pub fn note_slow_pass(session_id: &str, elapsed_ms: u128, interval_ms: u128) {
    if elapsed_ms > interval_ms {
        warn!(
            session_id,
            elapsed_ms = elapsed_ms as u64,
            interval_ms = interval_ms as u64,
            slow = true,
            "sampling pass overran its interval"
        );
    }
}

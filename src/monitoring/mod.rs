/*!
 * Monitoring
 * Event sinks for samples and process output, plus tracing setup
 */

mod sink;
mod tracer;

pub use sink::{EventSink, JsonLinesSink, MemorySink, SinkEvent, TracingSink};
pub use tracer::{generate_session_id, init_tracing, note_slow_pass, SessionSpan};

#[cfg(test)]
pub use sink::MockEventSink;

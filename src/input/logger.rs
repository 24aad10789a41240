/*!
 * Input Logger Session
 *
 * Owns the `input-logger` pump thread. The thread starts on the first
 * non-off state, keeps running across anonymized/full switches (only the
 * detail flag changes) and is stopped and joined when logging is turned
 * off or the session is dropped.
 */

use super::{InputEvent, InputLogState, InputRecord};
use crate::core::errors::{InputError, InputResult};
use crate::monitoring::EventSink;
use flume::{Receiver, Selector, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Source of raw keyboard and mouse events
pub trait InputHook: Send {
    /// Start delivering events
    fn install(&mut self) -> InputResult<Receiver<InputEvent>>;

    /// Stop delivering events
    fn uninstall(&mut self) {}
}

/// In-process hook fed through a channel
#[derive(Debug, Clone)]
pub struct ChannelHook {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl ChannelHook {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Producer end for injecting events
    pub fn sender(&self) -> Sender<InputEvent> {
        self.tx.clone()
    }
}

impl Default for ChannelHook {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHook for ChannelHook {
    fn install(&mut self) -> InputResult<Receiver<InputEvent>> {
        Ok(self.rx.clone())
    }
}

struct Pump {
    stop: Sender<()>,
    handle: JoinHandle<u64>,
}

/// Input-logging session
pub struct InputLogger {
    sink: Arc<dyn EventSink>,
    hook: Box<dyn InputHook>,
    detailed: Arc<AtomicBool>,
    state: InputLogState,
    pump: Option<Pump>,
}

impl InputLogger {
    pub fn new(sink: Arc<dyn EventSink>, hook: Box<dyn InputHook>) -> Self {
        Self {
            sink,
            hook,
            detailed: Arc::new(AtomicBool::new(false)),
            state: InputLogState::Off,
            pump: None,
        }
    }

    pub fn state(&self) -> InputLogState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.pump.is_some()
    }

    /// Switch logging detail, starting or stopping the pump as needed
    pub fn set_state(&mut self, state: InputLogState) -> InputResult<()> {
        if state == InputLogState::Off {
            self.stop();
            self.state = state;
            return Ok(());
        }

        self.detailed
            .store(state == InputLogState::Full, Ordering::Relaxed);
        if self.pump.is_none() {
            self.start()?;
        }
        self.state = state;
        Ok(())
    }

    fn start(&mut self) -> InputResult<()> {
        let events = self.hook.install()?;
        let (stop, stop_rx) = flume::bounded(1);
        let sink = self.sink.clone();
        let detailed = self.detailed.clone();

        let spawned = thread::Builder::new()
            .name("input-logger".to_string())
            .spawn(move || pump_loop(&events, &stop_rx, sink.as_ref(), &detailed));

        match spawned {
            Ok(handle) => {
                debug!("Input logging started");
                self.pump = Some(Pump { stop, handle });
                Ok(())
            }
            Err(e) => {
                self.hook.uninstall();
                Err(InputError::ThreadSpawn(e.to_string()))
            }
        }
    }

    fn stop(&mut self) {
        let Some(pump) = self.pump.take() else {
            return;
        };

        let _ = pump.stop.send(());
        match pump.handle.join() {
            Ok(forwarded) => debug!(forwarded, "Input logging stopped"),
            Err(_) => warn!("Input logger thread panicked"),
        }
        self.hook.uninstall();
    }
}

impl Drop for InputLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump_loop(
    events: &Receiver<InputEvent>,
    stop: &Receiver<()>,
    sink: &dyn EventSink,
    detailed: &AtomicBool,
) -> u64 {
    let mut forwarded = 0u64;
    loop {
        let next = Selector::new()
            .recv(stop, |_| None)
            .recv(events, |event| event.ok())
            .wait();

        let Some(event) = next else {
            break;
        };
        let record = InputRecord::from_event(event, detailed.load(Ordering::Relaxed));
        sink.input(&record);
        forwarded += 1;
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::monitoring::{MemorySink, SinkEvent};
    use std::time::{Duration, Instant};

    fn wait_for(sink: &MemorySink, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn labels(sink: &MemorySink) -> Vec<String> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Input { record } => Some(record.label),
                _ => None,
            })
            .collect()
    }

    fn key(code: u32) -> InputEvent {
        InputEvent::KeyDown {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    #[test]
    fn test_off_when_off_is_noop() {
        let mut logger = InputLogger::new(Arc::new(MemorySink::new()), Box::new(ChannelHook::new()));
        logger.set_state(InputLogState::Off).unwrap();
        assert!(!logger.is_running());
    }

    #[test]
    fn test_anonymized_then_full() {
        let sink = Arc::new(MemorySink::new());
        let hook = ChannelHook::new();
        let tx = hook.sender();
        let mut logger = InputLogger::new(sink.clone(), Box::new(hook));

        logger.set_state(InputLogState::Anonymized).unwrap();
        assert!(logger.is_running());
        tx.send(key(0x51)).unwrap();
        wait_for(&sink, 1);

        logger.set_state(InputLogState::Full).unwrap();
        tx.send(key(0x51)).unwrap();
        wait_for(&sink, 2);

        logger.set_state(InputLogState::Off).unwrap();
        assert!(!logger.is_running());
        assert_eq!(labels(&sink), vec!["A".to_string(), "Q".to_string()]);
    }

    #[test]
    fn test_events_after_off_are_not_forwarded() {
        let sink = Arc::new(MemorySink::new());
        let hook = ChannelHook::new();
        let tx = hook.sender();
        let mut logger = InputLogger::new(sink.clone(), Box::new(hook));

        logger.set_state(InputLogState::Full).unwrap();
        logger.set_state(InputLogState::Off).unwrap();
        tx.send(key(0x41)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(sink.is_empty());
    }
}

/*!
 * Exit/Output Wait Set
 *
 * Two independent signals observed through a single blocking multi-wait:
 *
 * - **exit**: sticky (manual-reset). Once raised it stays raised, like a
 *   process handle that has become signaled.
 * - **output**: edge-triggered (auto-reset). Raising it several times before
 *   a waiter runs coalesces into one wake; waiters must re-check the buffer.
 *
 * When both are pending, exit wins.
 */

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Which signal ended a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Exited,
    Output,
}

#[derive(Debug, Default)]
struct Signals {
    exited: bool,
    output: bool,
}

impl Signals {
    /// Consume the highest-priority pending signal
    #[inline]
    fn take(&mut self) -> Option<Wake> {
        if self.exited {
            Some(Wake::Exited)
        } else if self.output {
            self.output = false;
            Some(Wake::Output)
        } else {
            None
        }
    }
}

/// Condvar-backed wait on {exit, output}
#[derive(Debug, Default)]
pub struct WaitSet {
    signals: Mutex<Signals>,
    condvar: Condvar,
}

impl WaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the output signal (duplicates coalesce)
    pub fn notify_output(&self) {
        let mut signals = self.signals.lock();
        signals.output = true;
        self.condvar.notify_all();
    }

    /// Raise the sticky exit signal
    pub fn notify_exited(&self) {
        let mut signals = self.signals.lock();
        signals.exited = true;
        self.condvar.notify_all();
    }

    /// Whether exit has been signaled
    pub fn has_exited(&self) -> bool {
        self.signals.lock().exited
    }

    /// Block until either signal is raised
    pub fn wait_any(&self) -> Wake {
        let mut signals = self.signals.lock();
        loop {
            if let Some(wake) = signals.take() {
                return wake;
            }
            self.condvar.wait(&mut signals);
        }
    }

    /// Block until either signal is raised or the timeout elapses
    ///
    /// Returns `None` on timeout.
    pub fn wait_any_timeout(&self, timeout: Duration) -> Option<Wake> {
        let deadline = std::time::Instant::now() + timeout;
        let mut signals = self.signals.lock();
        loop {
            if let Some(wake) = signals.take() {
                return Some(wake);
            }
            if self.condvar.wait_until(&mut signals, deadline).timed_out() {
                return signals.take();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_output_is_edge_triggered() {
        let set = WaitSet::new();
        set.notify_output();
        set.notify_output();

        assert_eq!(set.wait_any(), Wake::Output);
        // Both notifications coalesced into one wake
        assert_eq!(set.wait_any_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn test_exit_is_sticky_and_wins() {
        let set = WaitSet::new();
        set.notify_output();
        set.notify_exited();

        assert_eq!(set.wait_any(), Wake::Exited);
        assert_eq!(set.wait_any(), Wake::Exited);
        assert!(set.has_exited());
    }

    #[test]
    fn test_wake_from_other_thread() {
        let set = Arc::new(WaitSet::new());
        let set_clone = set.clone();

        let handle = thread::spawn(move || set_clone.wait_any());

        thread::sleep(Duration::from_millis(50));
        set.notify_exited();

        assert_eq!(handle.join().unwrap(), Wake::Exited);
    }

    #[test]
    fn test_timeout_without_signal() {
        let set = WaitSet::new();
        let start = std::time::Instant::now();
        assert_eq!(set.wait_any_timeout(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}

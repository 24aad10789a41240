/*!
 * Output Buffer
 * Append-only text accumulator drained by take-and-clear
 */

use parking_lot::Mutex;

/// Mutex-guarded output text
///
/// Appends and takes never interleave, so every appended piece of text is
/// returned by exactly one `take`.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: Mutex<String>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded output
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.text.lock().push_str(text);
    }

    /// Atomically take the full contents, leaving the buffer empty
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.text.lock())
    }

    /// Buffered length in bytes
    pub fn len(&self) -> usize {
        self.text.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_clears() {
        let buffer = OutputBuffer::new();
        buffer.append("hello ");
        buffer.append("world");

        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.take(), "hello world");
        assert!(buffer.is_empty());
        assert_eq!(buffer.take(), "");
    }

    #[test]
    fn test_concurrent_take_loses_nothing() {
        let buffer = Arc::new(OutputBuffer::new());
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    buffer.append(&format!("{};", i));
                }
            })
        };

        let mut collected = String::new();
        while !writer.is_finished() {
            collected.push_str(&buffer.take());
        }
        writer.join().unwrap();
        collected.push_str(&buffer.take());

        let expected: String = (0..2000).map(|i| format!("{};", i)).collect();
        assert_eq!(collected, expected);
    }
}

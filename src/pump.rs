//! Background output collection.
//!
//! An [`OutputPump`] owns the thread that copies one process's stdout into
//! its [`LineBuffer`], one line at a time.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::sync::LineBuffer;

/// Poll interval while waiting for a pump thread to finish
const JOIN_POLL_MS: u64 = 5;

/// Copy every line from `reader` into `buffer`, then close it.
///
/// Trailing whitespace (including `\r\n`) is stripped and invalid UTF-8 is
/// replaced. Returns the number of lines forwarded.
pub fn pump_lines<R: BufRead>(label: &str, mut reader: R, buffer: &LineBuffer) -> usize {
    let mut raw = Vec::new();
    let mut count = 0;
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&raw);
                buffer.push(line.trim_end().to_string());
                count += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("{label}: stopped reading output: {e}");
                break;
            }
        }
    }
    buffer.close();
    count
}

/// Handle to the thread pumping one process's output.
pub struct OutputPump {
    label: String,
    handle: Option<JoinHandle<usize>>,
}

impl OutputPump {
    /// Spawn the pump thread for `output`.
    ///
    /// The thread runs until the stream reports end of file, which happens
    /// once the process exits and the pipe drains.
    pub fn start<R>(label: &str, output: R, buffer: Arc<LineBuffer>) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let thread_label = label.to_string();
        let handle = thread::Builder::new()
            .name(format!("{label}-stdout"))
            .spawn(move || pump_lines(&thread_label, BufReader::new(output), &buffer))?;

        Ok(OutputPump {
            label: label.to_string(),
            handle: Some(handle),
        })
    }

    /// True once the thread has exited (or was already joined).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait up to `grace` for the thread to finish and join it.
    ///
    /// If the pipe is still held open (for instance by a grandchild of the
    /// engine process) the thread is detached instead. Returns whether the
    /// thread was joined.
    pub fn join(&mut self, grace: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(JOIN_POLL_MS));
        }

        if !handle.is_finished() {
            warn!("{}: output still open after {:?}, detaching reader", self.label, grace);
            return false;
        }

        match handle.join() {
            Ok(count) => debug!("{}: reader finished after {count} lines", self.label),
            Err(_) => warn!("{}: reader thread panicked", self.label),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pump_lines_strips_and_closes() {
        let buffer = LineBuffer::new();
        let input = Cursor::new(b"uciok\r\na2a3: 20  \n\nNodes searched: 20".to_vec());

        let count = pump_lines("test", input, &buffer);

        assert_eq!(count, 4);
        assert!(buffer.is_closed());
        assert_eq!(
            buffer.drain(),
            vec!["uciok", "a2a3: 20", "", "Nodes searched: 20"]
        );
    }

    #[test]
    fn test_pump_lines_replaces_invalid_utf8() {
        let buffer = LineBuffer::new();
        let input = Cursor::new(b"info \xff\n".to_vec());

        pump_lines("test", input, &buffer);

        assert_eq!(buffer.drain(), vec!["info \u{fffd}"]);
    }

    #[test]
    fn test_pump_thread_joins_after_eof() {
        let buffer = Arc::new(LineBuffer::new());
        let input = Cursor::new(b"readyok\n".to_vec());

        let mut pump = OutputPump::start("test", input, Arc::clone(&buffer)).unwrap();

        assert!(pump.join(Duration::from_secs(5)));
        assert!(pump.is_finished());
        assert!(buffer.is_closed());
        assert_eq!(buffer.drain(), vec!["readyok"]);
        // second join is a no-op
        assert!(pump.join(Duration::ZERO));
    }
}

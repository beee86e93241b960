//! Synchronization primitives for engine sessions.
//!
//! Provides the line buffer shared between an output pump and the session
//! that consumes it.

use std::collections::VecDeque;
use std::mem;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Result of waiting on a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drained {
    /// Every line that was buffered, oldest first (never empty)
    Lines(Vec<String>),
    /// The stream ended and nothing is left to read
    Closed,
    /// The deadline passed with nothing buffered
    TimedOut,
}

#[derive(Default)]
struct BufferState {
    lines: VecDeque<String>,
    closed: bool,
}

/// A thread-safe FIFO of lines read from one process's output.
///
/// One pump pushes, one session pops or drains. All operations take the same
/// lock, so a drain never observes half of a push.
#[derive(Default)]
pub struct LineBuffer {
    state: Mutex<BufferState>,
    ready: Condvar,
}

impl LineBuffer {
    /// Create an empty, open buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the tail and wake any waiting reader.
    pub fn push(&self, line: String) {
        self.state.lock().lines.push_back(line);
        self.ready.notify_all();
    }

    /// Remove and return the oldest line, if any.
    #[must_use]
    pub fn pop_front(&self) -> Option<String> {
        self.state.lock().lines.pop_front()
    }

    /// Take every buffered line in arrival order, leaving the buffer empty.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        let mut state = self.state.lock();
        mem::take(&mut state.lines).into()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().lines.is_empty()
    }

    /// Mark the end of the stream. Lines already buffered stay readable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Block until lines are available, the stream is closed, or `deadline`
    /// passes. `None` waits without limit.
    ///
    /// Buffered lines win over both closure and timeout: a closed buffer
    /// still hands out what it holds before reporting [`Drained::Closed`].
    pub fn wait_drain(&self, deadline: Option<Instant>) -> Drained {
        let mut state = self.state.lock();
        loop {
            if !state.lines.is_empty() {
                return Drained::Lines(mem::take(&mut state.lines).into());
            }
            if state.closed {
                return Drained::Closed;
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out()
                        && state.lines.is_empty()
                        && !state.closed
                    {
                        return Drained::TimedOut;
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_push_pop_drain_lifecycle() {
        let buffer = LineBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.pop_front(), None);

        buffer.push("a2a3: 20".to_string());
        buffer.push("b2b3: 20".to_string());
        buffer.push("Nodes searched: 40".to_string());
        assert_eq!(buffer.len(), 3);

        assert_eq!(buffer.pop_front().as_deref(), Some("a2a3: 20"));
        assert_eq!(
            buffer.drain(),
            lines(&["b2b3: 20", "Nodes searched: 40"])
        );
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_wait_drain_prefers_lines_over_close() {
        let buffer = LineBuffer::new();
        buffer.push("readyok".to_string());
        buffer.close();

        assert_eq!(buffer.wait_drain(None), Drained::Lines(lines(&["readyok"])));
        assert_eq!(buffer.wait_drain(None), Drained::Closed);
        assert!(buffer.is_closed());
    }

    #[test]
    fn test_wait_drain_times_out_when_silent() {
        let buffer = LineBuffer::new();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(buffer.wait_drain(Some(deadline)), Drained::TimedOut);
    }

    #[test]
    fn test_wait_drain_wakes_on_push_from_other_thread() {
        let buffer = Arc::new(LineBuffer::new());
        let producer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push("uciok".to_string());
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(
            buffer.wait_drain(Some(deadline)),
            Drained::Lines(lines(&["uciok"]))
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_drain_wakes_on_close() {
        let buffer = Arc::new(LineBuffer::new());
        let producer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.close();
        });

        assert_eq!(buffer.wait_drain(None), Drained::Closed);
        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_drains_preserve_push_order() {
        let buffer = Arc::new(LineBuffer::new());
        let producer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            for i in 0..2000 {
                producer.push(format!("line {i}"));
            }
            producer.close();
        });

        let mut received = Vec::new();
        loop {
            match buffer.wait_drain(None) {
                Drained::Lines(batch) => received.extend(batch),
                Drained::Closed => break,
                Drained::TimedOut => unreachable!("no deadline given"),
            }
        }
        handle.join().unwrap();

        let expected: Vec<String> = (0..2000).map(|i| format!("line {i}")).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_random_pops_and_drains_across_threads() {
        use rand::prelude::*;

        let buffer = Arc::new(LineBuffer::new());
        let producer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            for i in 0..500 {
                producer.push(format!("h2h4: {i}"));
                if i % 50 == 0 {
                    thread::yield_now();
                }
            }
            producer.close();
        });

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut received = Vec::new();
        while !(buffer.is_closed() && buffer.is_empty()) {
            if rng.gen_bool(0.5) {
                received.extend(buffer.pop_front());
            } else {
                received.extend(buffer.drain());
            }
        }
        handle.join().unwrap();

        let expected: Vec<String> = (0..500).map(|i| format!("h2h4: {i}")).collect();
        assert_eq!(received, expected);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Pop,
        Drain,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![3 => Just(Op::Push), 1 => Just(Op::Pop), 1 => Just(Op::Drain)]
    }

    proptest! {
        /// Property: interleaved pops and drains hand back exactly the push order
        #[test]
        fn prop_consumer_sees_push_order(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let buffer = LineBuffer::new();
            let mut pushed = Vec::new();
            let mut consumed = Vec::new();

            for (i, op) in ops.iter().enumerate() {
                match op {
                    Op::Push => {
                        let line = format!("e2e4: {i}");
                        pushed.push(line.clone());
                        buffer.push(line);
                    }
                    Op::Pop => consumed.extend(buffer.pop_front()),
                    Op::Drain => consumed.extend(buffer.drain()),
                }
            }
            consumed.extend(buffer.drain());

            prop_assert_eq!(consumed, pushed);
            prop_assert!(buffer.is_empty());
        }
    }
}

//! A running engine process and the read protocol on top of its output.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::SessionError;
use crate::pump::OutputPump;
use crate::sync::{Drained, LineBuffer};
use crate::uci::{UciCommand, READY_OK};

/// How long an engine gets to honour `quit` before it is signalled
const QUIT_GRACE_MS: u64 = 200;

/// How long a terminated engine gets to exit before it is killed outright
const TERMINATE_GRACE_MS: u64 = 500;

/// How long teardown waits for the reader thread after the process exits
const PUMP_JOIN_GRACE_MS: u64 = 1000;

/// Poll interval while waiting for a terminated process
const EXIT_POLL_MS: u64 = 10;

/// An engine executable and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    program: String,
    args: Vec<String>,
}

impl EngineCommand {
    /// Split a command line with shell quoting rules, e.g. `cargo run --release`.
    pub fn parse(label: &str, line: &str) -> Result<Self, SessionError> {
        let invalid = || SessionError::InvalidCommand {
            engine: label.to_string(),
            command: line.to_string(),
        };
        let mut words = shell_words::split(line).map_err(|_| invalid())?.into_iter();
        let program = words.next().ok_or_else(invalid)?;
        Ok(EngineCommand {
            program,
            args: words.collect(),
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        write!(f, "{}", shell_words::join(words))
    }
}

/// Lifecycle of an [`EngineSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process and reader started, session not yet handed out
    Created,
    Running,
    /// `kill` is waiting for the process to exit
    Terminating,
    Terminated,
}

/// One engine subprocess with its output reader.
///
/// Output is collected in the background from the moment the process
/// starts, so nothing is lost while commands are being sent. Dropping the
/// session terminates the process.
pub struct EngineSession {
    label: String,
    command: EngineCommand,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    buffer: Arc<LineBuffer>,
    pump: OutputPump,
    /// Lines drained past a sentinel, handed out before anything new
    carry: VecDeque<String>,
    read_timeout: Option<Duration>,
    state: SessionState,
}

impl EngineSession {
    /// Start the engine with piped stdin and stdout and attach its reader.
    pub fn spawn(label: &str, command: &EngineCommand) -> Result<Self, SessionError> {
        let launch_error = |source: io::Error| SessionError::Launch {
            engine: label.to_string(),
            command: command.to_string(),
            source,
        };

        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(launch_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            reap(&mut child);
            return Err(launch_error(io::Error::other("engine pipes unavailable")));
        };

        let buffer = Arc::new(LineBuffer::new());
        let pump = match OutputPump::start(label, stdout, Arc::clone(&buffer)) {
            Ok(pump) => pump,
            Err(source) => {
                reap(&mut child);
                return Err(launch_error(source));
            }
        };

        info!("{label}: started '{command}' (pid {})", child.id());

        let mut session = EngineSession {
            label: label.to_string(),
            command: command.clone(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            buffer,
            pump,
            carry: VecDeque::new(),
            read_timeout: None,
            state: SessionState::Created,
        };
        session.transition(SessionState::Running);
        Ok(session)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Default timeout for [`read_until`](Self::read_until). `None` waits forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Number of lines received but not yet read.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len() + self.buffer.len()
    }

    /// Write one command line and flush it.
    pub fn send(&mut self, command: impl fmt::Display) -> Result<(), SessionError> {
        let command = command.to_string();

        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.stdin = None;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.channel_closed(command));
        };

        info!("{}: sending command: '{}'", self.label, command);
        if let Err(e) = write_line(stdin, &command) {
            debug!("{}: write failed: {e}", self.label);
            self.stdin = None;
            return Err(self.channel_closed(command));
        }
        Ok(())
    }

    /// Take everything received so far without waiting.
    pub fn read_available(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = self.carry.drain(..).collect();
        lines.extend(self.buffer.drain());
        for line in &lines {
            debug!("{}: read: {}", self.label, line);
        }
        lines
    }

    /// Read until a line contains `sentinel`, using the session's default timeout.
    ///
    /// The returned lines end with the sentinel line. Anything received after
    /// it stays queued for the next read.
    pub fn read_until(&mut self, sentinel: &str) -> Result<Vec<String>, SessionError> {
        self.read_until_timeout(sentinel, self.read_timeout)
    }

    /// Read until a line contains `sentinel`, giving up after `timeout`.
    pub fn read_until_timeout(
        &mut self,
        sentinel: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, SessionError> {
        self.read_until_any_timeout(&[sentinel], timeout)
    }

    /// Read until a line contains any of `sentinels`, using the session's
    /// default timeout.
    pub fn read_until_any(&mut self, sentinels: &[&str]) -> Result<Vec<String>, SessionError> {
        self.read_until_any_timeout(sentinels, self.read_timeout)
    }

    /// Read until a line contains any of `sentinels`, giving up after `timeout`.
    ///
    /// On failure the lines read so far go back to the front of the queue,
    /// so a retry sees the whole reply.
    pub fn read_until_any_timeout(
        &mut self,
        sentinels: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, SessionError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut result: Vec<String> = Vec::new();

        loop {
            let batch: Vec<String> = if self.carry.is_empty() {
                match self.buffer.wait_drain(deadline) {
                    Drained::Lines(lines) => lines,
                    Drained::Closed => {
                        let err = SessionError::StreamEnded {
                            engine: self.label.clone(),
                            sentinel: sentinels.join("' or '"),
                            received: result.len(),
                        };
                        self.requeue(result);
                        return Err(err);
                    }
                    Drained::TimedOut => {
                        let err = SessionError::Timeout {
                            engine: self.label.clone(),
                            sentinel: sentinels.join("' or '"),
                            waited: started.elapsed(),
                        };
                        self.requeue(result);
                        return Err(err);
                    }
                }
            } else {
                self.carry.drain(..).collect()
            };

            let mut lines = batch.into_iter();
            while let Some(line) = lines.next() {
                debug!("{}: read: {}", self.label, line);
                let found = sentinels.iter().any(|s| line.contains(s));
                result.push(line);
                if found {
                    self.carry.extend(lines);
                    return Ok(result);
                }
            }
        }
    }

    /// Send `isready` and wait for `readyok`.
    pub fn sync_ready(&mut self) -> Result<(), SessionError> {
        self.send(UciCommand::IsReady)?;
        self.read_until(READY_OK)?;
        Ok(())
    }

    /// Ask the engine to print its board and return the printed lines.
    pub fn display_board(&mut self) -> Result<Vec<String>, SessionError> {
        self.send(UciCommand::Display)?;
        self.send(UciCommand::IsReady)?;
        let mut lines = self.read_until(READY_OK)?;
        lines.pop();
        Ok(lines)
    }

    /// Terminate the engine and wait for it to exit.
    ///
    /// Safe to call repeatedly; later calls return immediately.
    pub fn kill(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.transition(SessionState::Terminating);

        if let Some(stdin) = self.stdin.as_mut() {
            if let Err(e) = write_line(stdin, &UciCommand::Quit.to_string()) {
                debug!("{}: could not send quit: {e}", self.label);
            }
        }
        self.stdin = None;
        self.terminate();

        match self.child.wait() {
            Ok(status) => info!("{}: '{}' exited ({status})", self.label, self.command),
            Err(e) => debug!("{}: wait failed: {e}", self.label),
        }
        self.pump.join(Duration::from_millis(PUMP_JOIN_GRACE_MS));
        self.transition(SessionState::Terminated);
    }

    /// Poll for exit until `grace` passes. True once the process is gone.
    fn exited_within(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(None) => thread::sleep(Duration::from_millis(EXIT_POLL_MS)),
                _ => return true,
            }
        }
        false
    }

    fn terminate(&mut self) {
        // stdin is closed and `quit` was sent; a well-behaved engine is gone already
        if self.exited_within(Duration::from_millis(QUIT_GRACE_MS)) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                debug!("{}: SIGTERM failed: {e}", self.label);
            }

            if self.exited_within(Duration::from_millis(TERMINATE_GRACE_MS)) {
                return;
            }
        }

        if let Err(e) = self.child.kill() {
            debug!("{}: kill failed, process already gone: {e}", self.label);
        }
    }

    fn requeue(&mut self, lines: Vec<String>) {
        for line in lines.into_iter().rev() {
            self.carry.push_front(line);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{}: {:?} -> {:?}", self.label, self.state, next);
        self.state = next;
    }

    fn channel_closed(&self, command: String) -> SessionError {
        SessionError::ChannelClosed {
            engine: self.label.clone(),
            command,
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.kill();
    }
}

fn write_line(stdin: &mut BufWriter<ChildStdin>, command: &str) -> io::Result<()> {
    stdin.write_all(command.as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

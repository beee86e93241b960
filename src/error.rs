//! Error types for engine sessions.

use std::fmt;
use std::io;
use std::time::Duration;

/// Error type for everything that can go wrong while driving an engine process.
///
/// Every variant carries the label of the engine it concerns so the operator
/// can tell the reference and candidate apart.
#[derive(Debug)]
pub enum SessionError {
    /// The engine command line is empty or could not be split into words
    InvalidCommand { engine: String, command: String },
    /// The executable could not be found or started
    Launch {
        engine: String,
        command: String,
        source: io::Error,
    },
    /// A command was sent after the engine's input was closed
    ChannelClosed { engine: String, command: String },
    /// The engine's output ended before the sentinel appeared
    StreamEnded {
        engine: String,
        sentinel: String,
        received: usize,
    },
    /// The sentinel did not appear within the read timeout
    Timeout {
        engine: String,
        sentinel: String,
        waited: Duration,
    },
    /// The engine answered with an error line instead of the expected reply
    EngineReported { engine: String, line: String },
}

impl SessionError {
    /// Label of the engine this error refers to.
    #[must_use]
    pub fn engine(&self) -> &str {
        match self {
            SessionError::InvalidCommand { engine, .. }
            | SessionError::Launch { engine, .. }
            | SessionError::ChannelClosed { engine, .. }
            | SessionError::StreamEnded { engine, .. }
            | SessionError::Timeout { engine, .. }
            | SessionError::EngineReported { engine, .. } => engine,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidCommand { engine, command } => {
                write!(f, "{engine}: invalid engine command '{command}'")
            }
            SessionError::Launch {
                engine,
                command,
                source,
            } => {
                write!(f, "{engine}: failed to launch '{command}': {source}")
            }
            SessionError::ChannelClosed { engine, command } => {
                write!(f, "{engine}: input closed, could not send '{command}'")
            }
            SessionError::StreamEnded {
                engine,
                sentinel,
                received,
            } => {
                write!(
                    f,
                    "{engine}: output ended after {received} lines without '{sentinel}'"
                )
            }
            SessionError::Timeout {
                engine,
                sentinel,
                waited,
            } => {
                write!(
                    f,
                    "{engine}: no '{sentinel}' within {} ms",
                    waited.as_millis()
                )
            }
            SessionError::EngineReported { engine, line } => {
                write!(f, "{engine}: engine reported '{line}'")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}

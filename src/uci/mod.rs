//! The slice of the Universal Chess Interface this tool speaks.
//!
//! Commands written to engines, the sentinels that end their replies, and
//! lenient parsing of `perft` output lines.

#[cfg(feature = "serde")]
use serde::Serialize;

pub mod command;

pub use command::UciCommand;

/// Ends the reply to `go perft`
pub const NODES_SEARCHED: &str = "Nodes searched:";
/// Ends the reply to `isready`
pub const READY_OK: &str = "readyok";
/// Ends a reply the engine could not produce, e.g. `error: illegal move`
pub const ENGINE_ERROR: &str = "error";

/// One per-move line of a `perft` reply, e.g. `e2e4: 600`.
///
/// The count stays text: it is only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MoveCount {
    pub mv: String,
    pub count: String,
}

impl MoveCount {
    /// Parse `<move>: <count>`. Returns `None` for anything else.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (mv, count) = line.split_once(':')?;
        let mv = mv.trim();
        let count = count.trim();
        if mv.is_empty() || count.is_empty() || mv.contains(char::is_whitespace) {
            return None;
        }
        Some(MoveCount {
            mv: mv.to_string(),
            count: count.to_string(),
        })
    }
}

/// True for the `Nodes searched: N` line closing a `perft` reply.
#[must_use]
pub fn is_total_line(line: &str) -> bool {
    line.contains(NODES_SEARCHED)
}

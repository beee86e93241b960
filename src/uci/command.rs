use std::fmt;

/// Commands this tool writes to an engine.
///
/// `Display` renders the exact wire text, without the trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    IsReady,
    Position { position: String, moves: String },
    GoPerft(u32),
    /// Non-standard board dump understood by Stockfish and most test engines
    Display,
    Quit,
}

impl UciCommand {
    #[must_use]
    pub fn position(position: &str, moves: &str) -> Self {
        UciCommand::Position {
            position: position.to_string(),
            moves: moves.to_string(),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::IsReady => write!(f, "isready"),
            // an empty move list still keeps the trailing space
            UciCommand::Position { position, moves } => {
                write!(f, "position {position} moves {moves}")
            }
            UciCommand::GoPerft(depth) => write!(f, "go perft {depth}"),
            UciCommand::Display => write!(f, "d"),
            UciCommand::Quit => write!(f, "quit"),
        }
    }
}

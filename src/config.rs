//! Command-line surface and run configuration.

use std::time::Duration;

use clap::Parser;

use crate::perft::{PerftComparator, PerftRequest};

pub const REFERENCE: &str = "reference";
pub const CANDIDATE: &str = "candidate";

pub const DEFAULT_REFERENCE_COMMAND: &str = "stockfish";
pub const DEFAULT_CANDIDATE_COMMAND: &str = "cargo run main";
pub const DEFAULT_POSITION: &str = "startpos";
pub const DEFAULT_DEPTH: u32 = 3;

/// Compare `go perft` output of a candidate engine against a reference engine.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Log every line read from the engines
    #[arg(short, long)]
    pub debug: bool,

    /// Position passed to `position`, e.g. `startpos` or `fen <fen>`
    #[arg(default_value = DEFAULT_POSITION)]
    pub position: String,

    /// Space-separated moves played from the position
    pub moves: Option<String>,

    /// Perft depth
    #[arg(default_value_t = DEFAULT_DEPTH)]
    pub depth: u32,

    /// Reference engine command line
    #[arg(long, env = "PERFT_DIFF_REFERENCE", default_value = DEFAULT_REFERENCE_COMMAND)]
    pub reference: String,

    /// Candidate engine command line
    #[arg(long, env = "PERFT_DIFF_CANDIDATE", default_value = DEFAULT_CANDIDATE_COMMAND)]
    pub candidate: String,

    /// Give up on an engine reply after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Also print the diff joined on move names
    #[arg(long)]
    pub keyed: bool,

    /// Print the candidate's board (`d`) before running perft
    #[arg(long)]
    pub show_board: bool,

    /// Skip the `isready` handshake
    #[arg(long)]
    pub no_sync: bool,
}

/// Everything one comparison run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareConfig {
    pub reference: String,
    pub candidate: String,
    pub request: PerftRequest,
    pub read_timeout: Option<Duration>,
    pub keyed: bool,
    pub show_board: bool,
    pub sync: bool,
    pub debug: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        CompareConfig {
            reference: DEFAULT_REFERENCE_COMMAND.to_string(),
            candidate: DEFAULT_CANDIDATE_COMMAND.to_string(),
            request: PerftRequest {
                position: DEFAULT_POSITION.to_string(),
                moves: String::new(),
                depth: DEFAULT_DEPTH,
            },
            read_timeout: None,
            keyed: false,
            show_board: false,
            sync: true,
            debug: false,
        }
    }
}

impl CompareConfig {
    #[must_use]
    pub fn comparator(&self) -> PerftComparator {
        PerftComparator {
            sync: self.sync,
            show_board: self.show_board,
        }
    }
}

impl From<Cli> for CompareConfig {
    fn from(cli: Cli) -> Self {
        CompareConfig {
            reference: cli.reference,
            candidate: cli.candidate,
            request: PerftRequest {
                position: cli.position,
                moves: cli.moves.unwrap_or_default(),
                depth: cli.depth,
            },
            read_timeout: cli.timeout_ms.map(Duration::from_millis),
            keyed: cli.keyed,
            show_board: cli.show_board,
            sync: !cli.no_sync,
            debug: cli.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CompareConfig {
        let argv = std::iter::once("perft_diff").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().into()
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let config = parse(&["--reference", "stockfish", "--candidate", "cargo run main"]);
        assert_eq!(config, CompareConfig::default());
    }

    #[test]
    fn test_cli_positionals() {
        let config = parse(&["-d", "fen 8/8/8/8/8/8/8/K1k5 w - - 0 1", "a1a2", "5"]);
        assert!(config.debug);
        assert_eq!(config.request.position, "fen 8/8/8/8/8/8/8/K1k5 w - - 0 1");
        assert_eq!(config.request.moves, "a1a2");
        assert_eq!(config.request.depth, 5);
    }

    #[test]
    fn test_cli_options() {
        let config = parse(&[
            "--reference",
            "/usr/bin/stockfish",
            "--candidate",
            "./target/release/engine --uci",
            "--timeout-ms",
            "2500",
            "--keyed",
            "--show-board",
            "--no-sync",
        ]);
        assert_eq!(config.reference, "/usr/bin/stockfish");
        assert_eq!(config.candidate, "./target/release/engine --uci");
        assert_eq!(config.read_timeout, Some(Duration::from_millis(2500)));
        assert!(config.keyed);
        assert!(!config.comparator().sync);
        assert!(config.comparator().show_board);
    }

    #[test]
    fn test_cli_rejects_bad_depth() {
        let argv = ["perft_diff", "startpos", "", "deep"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}

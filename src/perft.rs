//! Side-by-side comparison of two engines' `perft` replies.

use std::collections::BTreeMap;

use log::info;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::columns::render_columns;
use crate::error::SessionError;
use crate::session::EngineSession;
use crate::uci::{is_total_line, MoveCount, UciCommand, ENGINE_ERROR, NODES_SEARCHED};

pub const EQUAL: &str = "==";
pub const DIFFERENT: &str = "!=";

fn marker(same: bool) -> &'static str {
    if same {
        EQUAL
    } else {
        DIFFERENT
    }
}

fn with_header(name: &str, lines: &[String]) -> Vec<String> {
    let mut column = vec![name.to_string()];
    column.extend(lines.iter().cloned());
    column
}

/// What to enumerate: a position, the moves played from it, and a depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerftRequest {
    pub position: String,
    pub moves: String,
    pub depth: u32,
}

/// One engine's reply to `go perft`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PerftOutput {
    per_move: Vec<String>,
    total: Option<String>,
}

impl PerftOutput {
    /// Classify reply lines.
    ///
    /// The first `Nodes searched:` line is the total. Other lines with a
    /// colon are kept if they read `<move>: <count>`. Everything else is
    /// engine chatter and dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut output = PerftOutput::default();
        for line in lines {
            let line = line.as_ref().trim();
            if is_total_line(line) {
                if output.total.is_none() {
                    output.total = Some(line.to_string());
                }
            } else if MoveCount::parse(line).is_some() {
                output.per_move.push(line.to_string());
            }
        }
        output
    }

    /// Sort per-move lines by their full text.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.per_move.sort();
        self
    }

    #[must_use]
    pub fn per_move(&self) -> &[String] {
        &self.per_move
    }

    #[must_use]
    pub fn total(&self) -> Option<&str> {
        self.total.as_deref()
    }

    /// Per-move lines keyed by move.
    #[must_use]
    pub fn by_move(&self) -> BTreeMap<String, String> {
        self.per_move
            .iter()
            .filter_map(|line| MoveCount::parse(line))
            .map(|mc| (mc.mv, mc.count))
            .collect()
    }
}

/// Both engines' sorted replies, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PerftReport {
    reference_name: String,
    candidate_name: String,
    reference: PerftOutput,
    candidate: PerftOutput,
}

impl PerftReport {
    #[must_use]
    pub fn new(
        reference_name: &str,
        reference: PerftOutput,
        candidate_name: &str,
        candidate: PerftOutput,
    ) -> Self {
        PerftReport {
            reference_name: reference_name.to_string(),
            candidate_name: candidate_name.to_string(),
            reference: reference.sorted(),
            candidate: candidate.sorted(),
        }
    }

    #[must_use]
    pub fn reference(&self) -> &PerftOutput {
        &self.reference
    }

    #[must_use]
    pub fn candidate(&self) -> &PerftOutput {
        &self.candidate
    }

    /// Row markers pairing line `i` of one side with line `i` of the other.
    ///
    /// Rows without a partner get no marker.
    #[must_use]
    pub fn markers(&self) -> Vec<&'static str> {
        self.reference
            .per_move
            .iter()
            .zip(&self.candidate.per_move)
            .map(|(left, right)| marker(left == right))
            .collect()
    }

    #[must_use]
    pub fn total_marker(&self) -> &'static str {
        marker(self.reference.total == self.candidate.total)
    }

    /// Rows marked `!=`, unpaired rows, and a differing total.
    #[must_use]
    pub fn mismatches(&self) -> usize {
        let paired = self.markers().iter().filter(|m| **m == DIFFERENT).count();
        let unpaired = self
            .reference
            .per_move
            .len()
            .abs_diff(self.candidate.per_move.len());
        paired + unpaired + usize::from(self.total_marker() == DIFFERENT)
    }

    /// Per-move table followed by the totals table, positionally paired.
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        let mut markers = vec![String::new()];
        markers.extend(self.markers().into_iter().map(str::to_string));

        let mut out = render_columns(&[
            with_header(&self.reference_name, &self.reference.per_move),
            markers,
            with_header(&self.candidate_name, &self.candidate.per_move),
        ]);
        out.extend(self.render_totals());
        out
    }

    /// Per-move table joined on the move name instead of row position.
    #[must_use]
    pub fn render_keyed(&self) -> Vec<String> {
        let left = self.reference.by_move();
        let right = self.candidate.by_move();
        let mut moves: Vec<&String> = left.keys().chain(right.keys()).collect();
        moves.sort();
        moves.dedup();

        let mut columns = [
            vec![self.reference_name.clone()],
            vec![String::new()],
            vec![self.candidate_name.clone()],
        ];
        for mv in moves {
            let l = left.get(mv);
            let r = right.get(mv);
            columns[0].push(l.map(|c| format!("{mv}: {c}")).unwrap_or_default());
            columns[1].push(marker(l.is_some() && l == r).to_string());
            columns[2].push(r.map(|c| format!("{mv}: {c}")).unwrap_or_default());
        }

        let mut out = render_columns(&columns);
        out.extend(self.render_totals());
        out
    }

    fn render_totals(&self) -> Vec<String> {
        render_columns(&[
            vec![self.reference.total().unwrap_or_default()],
            vec![self.total_marker()],
            vec![self.candidate.total().unwrap_or_default()],
        ])
    }
}

/// Runs one `perft` request against a reference and a candidate engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerftComparator {
    /// Wait for `readyok` from both engines before starting
    pub sync: bool,
    /// Capture the candidate's board dump after the position is set
    pub show_board: bool,
}

impl Default for PerftComparator {
    fn default() -> Self {
        PerftComparator {
            sync: true,
            show_board: false,
        }
    }
}

/// Result of [`PerftComparator::run`].
#[derive(Debug, Clone)]
pub struct Comparison {
    pub report: PerftReport,
    /// Candidate's board dump, empty unless requested
    pub board: Vec<String>,
}

impl PerftComparator {
    /// Issue the request to both engines and collect the report.
    ///
    /// Both engines work concurrently: commands go to each before either
    /// reply is read.
    pub fn run(
        &self,
        reference: &mut EngineSession,
        candidate: &mut EngineSession,
        request: &PerftRequest,
    ) -> Result<Comparison, SessionError> {
        if self.sync {
            reference.sync_ready()?;
            candidate.sync_ready()?;
        }

        let position = UciCommand::position(&request.position, &request.moves);
        reference.send(&position)?;
        candidate.send(&position)?;

        let board = if self.show_board {
            candidate.display_board()?
        } else {
            Vec::new()
        };

        // anything left over from start-up must not be mistaken for a reply
        reference.read_available();
        candidate.read_available();

        let go = UciCommand::GoPerft(request.depth);
        reference.send(&go)?;
        candidate.send(&go)?;

        let reference_output = collect(reference)?;
        let candidate_output = collect(candidate)?;

        let report = PerftReport::new(
            reference.label(),
            reference_output,
            candidate.label(),
            candidate_output,
        );
        info!("perft {}: {} mismatching rows", request.depth, report.mismatches());
        Ok(Comparison { report, board })
    }
}

fn collect(session: &mut EngineSession) -> Result<PerftOutput, SessionError> {
    let lines = session.read_until_any(&[NODES_SEARCHED, ENGINE_ERROR])?;
    if let Some(last) = lines.last().filter(|line| !is_total_line(line)) {
        return Err(SessionError::EngineReported {
            engine: session.label().to_string(),
            line: last.clone(),
        });
    }
    let output = PerftOutput::from_lines(&lines);
    info!(
        "{}: {} moves, {}",
        session.label(),
        output.per_move().len(),
        output.total().unwrap_or("no total")
    );
    Ok(output)
}

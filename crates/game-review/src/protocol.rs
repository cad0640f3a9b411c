//! UCI line protocol: outbound commands and inbound line parsing.
//!
//! Unrecognised or malformed lines parse to `None` and are ignored by the
//! session.

use std::fmt;

/// Commands the session writes to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand<'a> {
    Uci,
    IsReady,
    SetOption { name: &'a str, value: &'a str },
    Position { fen: &'a str },
    GoDepth(u32),
    Stop,
    Quit,
}

impl fmt::Display for EngineCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => f.write_str("uci"),
            EngineCommand::IsReady => f.write_str("isready"),
            EngineCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            EngineCommand::Position { fen } => write!(f, "position fen {fen}"),
            EngineCommand::GoDepth(depth) => write!(f, "go depth {depth}"),
            EngineCommand::Stop => f.write_str("stop"),
            EngineCommand::Quit => f.write_str("quit"),
        }
    }
}

/// One depth-by-depth progress report, side-to-move perspective.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchUpdate {
    pub depth: u32,
    /// Pawns, or moves to mate when `is_mate` (positive = side to move mates)
    pub score: f64,
    pub is_mate: bool,
    pub pv: Vec<String>,
    /// First PV move
    pub best_move: Option<String>,
}

/// A recognised inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    Id { name: String },
    UciOk,
    ReadyOk,
    Info(SearchUpdate),
    /// `None` for `bestmove (none)`
    BestMove(Option<String>),
}

pub fn parse_line(line: &str) -> Option<EngineLine> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "uciok" => Some(EngineLine::UciOk),
        "readyok" => Some(EngineLine::ReadyOk),
        "id" => {
            if tokens.next()? != "name" {
                return None;
            }
            let name = tokens.collect::<Vec<_>>().join(" ");
            (!name.is_empty()).then_some(EngineLine::Id { name })
        }
        "bestmove" => {
            let mv = tokens.next()?;
            Some(EngineLine::BestMove(
                (mv != "(none)" && mv != "0000").then(|| mv.to_string()),
            ))
        }
        "info" => parse_info(line).map(EngineLine::Info),
        _ => None,
    }
}

/// Parse an `info` line carrying depth, score and (optionally) a PV.
///
/// Bound scores and secondary multipv lines are not final scores for the
/// position and are skipped.
fn parse_info(line: &str) -> Option<SearchUpdate> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut depth = None;
    let mut score = None;
    let mut pv = Vec::new();

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                depth = parts.get(i + 1).and_then(|v| v.parse::<u32>().ok());
                i += 2;
            }
            "score" => {
                let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                score = match (parts.get(i + 1).copied(), value) {
                    (Some("cp"), Some(cp)) => Some((f64::from(cp) / 100.0, false)),
                    // Side to move is already mated
                    (Some("mate"), Some(0)) => Some((-0.0, true)),
                    (Some("mate"), Some(mate)) => Some((f64::from(mate), true)),
                    _ => return None,
                };
                i += 3;
            }
            "lowerbound" | "upperbound" => return None,
            "multipv" => {
                if parts.get(i + 1).is_some_and(|v| *v != "1") {
                    return None;
                }
                i += 2;
            }
            "pv" => {
                // PV ends at next keyword or end of line
                pv = parts[i + 1..]
                    .iter()
                    .take_while(|part| !part.starts_with("bmc") && **part != "string")
                    .map(|part| part.to_string())
                    .collect();
                break;
            }
            "string" => break,
            _ => i += 1,
        }
    }

    let (score, is_mate) = score?;
    Some(SearchUpdate {
        depth: depth?,
        score,
        is_mate,
        best_move: pv.first().cloned(),
        pv,
    })
}

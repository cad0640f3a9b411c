//! The position timeline of a loaded game.
//!
//! A timeline is rebuilt wholesale for every transcript: `positions` holds the
//! start position plus the position after every half-move, `moves` the
//! half-moves themselves, so `positions.len() == moves.len() + 1` always holds.

use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Position};

use crate::error::GameLoadError;
use crate::game_data::GameHeaders;
use crate::pgn;
use crate::rules::{self, PieceKind, Side};

/// A board state: FEN plus the side to move derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub fen: String,
    pub side_to_move: Side,
}

impl PositionSnapshot {
    fn from_position(pos: &Chess) -> Self {
        Self {
            fen: rules::to_fen(pos),
            side_to_move: rules::side_to_move(pos),
        }
    }

    /// Rebuild the full position for rules queries.
    pub fn board(&self) -> Result<Chess, GameLoadError> {
        rules::parse_fen(&self.fen)
    }
}

/// The half-move that led from one snapshot to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub piece: PieceKind,
    pub color: Side,
    pub san: String,
    pub uci: String,
}

#[derive(Debug, Clone)]
pub struct GameTimeline {
    headers: GameHeaders,
    positions: Vec<PositionSnapshot>,
    moves: Vec<MoveRecord>,
    cursor: usize,
}

impl GameTimeline {
    /// Load a game from PGN or bare SAN text.
    pub fn from_pgn(text: &str) -> Result<Self, GameLoadError> {
        let parsed = pgn::parse_pgn(text)?;
        let start = match parsed.headers.start_fen.as_deref() {
            Some(fen) => rules::parse_fen(fen)?,
            None => Chess::default(),
        };
        Self::replay(parsed.headers, start, &parsed.moves)
    }

    /// Build a timeline from SAN moves played from the standard start position.
    pub fn from_san_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, GameLoadError> {
        Self::replay(GameHeaders::unknown(), Chess::default(), moves)
    }

    fn replay<S: AsRef<str>>(
        headers: GameHeaders,
        start: Chess,
        sans: &[S],
    ) -> Result<Self, GameLoadError> {
        let mut pos = start;
        let mut positions = Vec::with_capacity(sans.len() + 1);
        let mut moves = Vec::with_capacity(sans.len());
        positions.push(PositionSnapshot::from_position(&pos));

        for (ply, san) in sans.iter().enumerate() {
            let mv = rules::san_to_move(&pos, san.as_ref(), ply)?;
            let uci = rules::move_to_uci(&mv);
            let record = MoveRecord {
                from: uci.get(0..2).unwrap_or_default().to_string(),
                to: uci.get(2..4).unwrap_or_default().to_string(),
                piece: mv.role().into(),
                color: rules::side_to_move(&pos),
                san: rules::move_to_san(&pos, &mv),
                uci,
            };
            pos.play_unchecked(mv);
            positions.push(PositionSnapshot::from_position(&pos));
            moves.push(record);
        }

        Ok(Self {
            headers,
            positions,
            moves,
            cursor: 0,
        })
    }

    pub fn headers(&self) -> &GameHeaders {
        &self.headers
    }

    pub fn positions(&self) -> &[PositionSnapshot] {
        &self.positions
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn san_moves(&self) -> Vec<&str> {
        self.moves.iter().map(|m| m.san.as_str()).collect()
    }

    pub fn uci_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.uci.clone()).collect()
    }

    // ---- Cursor ----

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamped to `[0, positions.len() - 1]`.
    pub fn seek(&mut self, index: usize) -> usize {
        self.cursor = index.min(self.positions.len() - 1);
        self.cursor
    }

    pub fn step_forward(&mut self) -> usize {
        self.seek(self.cursor + 1)
    }

    pub fn step_back(&mut self) -> usize {
        self.seek(self.cursor.saturating_sub(1))
    }

    pub fn current_position(&self) -> &PositionSnapshot {
        &self.positions[self.cursor]
    }

    /// The move that produced the current position, if any.
    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.cursor.checked_sub(1).map(|i| &self.moves[i])
    }
}

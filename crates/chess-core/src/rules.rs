//! Position queries backed by shakmaty.
//!
//! The review pipeline never touches shakmaty types directly; it goes through
//! these helpers with FEN strings and coordinate moves.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};

use crate::error::GameLoadError;

// Piece values for material calculation
pub const PAWN_VALUE: i32 = 1;
pub const KNIGHT_VALUE: i32 = 3;
pub const BISHOP_VALUE: i32 = 3;
pub const ROOK_VALUE: i32 = 5;
pub const QUEEN_VALUE: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// +1 for White, -1 for Black: multiplies a White-perspective value into
    /// this side's perspective.
    pub fn sign(self) -> i32 {
        match self {
            Side::White => 1,
            Side::Black => -1,
        }
    }

    /// Side that plays half-move `ply` when the game starts with `first` to move.
    pub fn for_ply(first: Side, ply: usize) -> Self {
        if ply % 2 == 0 {
            first
        } else {
            first.opponent()
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Piece value (no king)
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => PAWN_VALUE,
            PieceKind::Knight => KNIGHT_VALUE,
            PieceKind::Bishop => BISHOP_VALUE,
            PieceKind::Rook => ROOK_VALUE,
            PieceKind::Queen => QUEEN_VALUE,
            PieceKind::King => 0,
        }
    }

    /// Knights, bishops, rooks and queens.
    pub fn is_minor_or_major(self) -> bool {
        matches!(
            self,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        )
    }
}

impl From<Role> for PieceKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Pawn => PieceKind::Pawn,
            Role::Knight => PieceKind::Knight,
            Role::Bishop => PieceKind::Bishop,
            Role::Rook => PieceKind::Rook,
            Role::Queen => PieceKind::Queen,
            Role::King => PieceKind::King,
        }
    }
}

/// Game-over condition of a position with no legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Checkmate { mated: Side },
    Stalemate,
}

pub fn parse_fen(fen: &str) -> Result<Chess, GameLoadError> {
    let parsed: Fen = fen.parse().map_err(|e: shakmaty::fen::ParseFenError| {
        GameLoadError::InvalidFen {
            fen: fen.to_string(),
            reason: e.to_string(),
        }
    })?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| GameLoadError::InvalidFen {
            fen: fen.to_string(),
            reason: e.to_string(),
        })
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn side_to_move(pos: &Chess) -> Side {
    pos.turn().into()
}

pub fn terminal_status(pos: &Chess) -> Option<TerminalStatus> {
    if pos.is_checkmate() {
        Some(TerminalStatus::Checkmate {
            mated: side_to_move(pos),
        })
    } else if pos.is_stalemate() {
        Some(TerminalStatus::Stalemate)
    } else {
        None
    }
}

/// Coordinate notation with standard castling (`e1g1`).
pub fn move_to_uci(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Resolve a coordinate move against a position; `None` if unparsable or illegal.
pub fn find_uci_move(pos: &Chess, uci: &str) -> Option<Move> {
    let uci_move: UciMove = uci.parse().ok()?;
    uci_move.to_move(pos).ok()
}

/// SAN with check/mate suffix for a move known to be legal in `pos`.
pub fn move_to_san(pos: &Chess, mv: &Move) -> String {
    let mut scratch = pos.clone();
    SanPlus::from_move_and_play_unchecked(&mut scratch, *mv).to_string()
}

/// Coordinates, piece and capture flag of a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveShape {
    pub from: String,
    pub to: String,
    pub piece: PieceKind,
    pub is_capture: bool,
}

/// Resolve a coordinate move and describe it; `None` if it does not apply.
pub fn inspect_uci(pos: &Chess, uci: &str) -> Option<MoveShape> {
    let mv = find_uci_move(pos, uci)?;
    let coords = move_to_uci(&mv);
    Some(MoveShape {
        from: coords.get(0..2)?.to_string(),
        to: coords.get(2..4)?.to_string(),
        piece: mv.role().into(),
        is_capture: mv.is_capture(),
    })
}

/// Position after a legal coordinate move.
pub fn play_uci(pos: &Chess, uci: &str) -> Option<Chess> {
    let mv = find_uci_move(pos, uci)?;
    let mut next = pos.clone();
    next.play_unchecked(mv);
    Some(next)
}

/// Convert a single coordinate move to SAN at a given position.
pub fn uci_to_san(pos: &Chess, uci: &str) -> Option<String> {
    let mv = find_uci_move(pos, uci)?;
    Some(move_to_san(pos, &mv))
}

/// Resolve a SAN token (suffixes allowed) against a position.
pub fn san_to_move(pos: &Chess, san: &str, ply: usize) -> Result<Move, GameLoadError> {
    let parsed: SanPlus = san.parse().map_err(|_| GameLoadError::InvalidSan {
        ply,
        san: san.to_string(),
    })?;
    parsed
        .san
        .to_move(pos)
        .map_err(|e| GameLoadError::IllegalMove {
            ply,
            san: san.to_string(),
            reason: e.to_string(),
        })
}

/// Convert a coordinate line to SAN, stopping at the first move that does not apply.
pub fn line_to_san(pos: &Chess, line: &[String]) -> Vec<String> {
    let mut pos = pos.clone();
    let mut sans = Vec::with_capacity(line.len());
    for uci in line {
        let Some(mv) = find_uci_move(&pos, uci) else {
            break;
        };
        sans.push(SanPlus::from_move_and_play_unchecked(&mut pos, mv).to_string());
    }
    sans
}

/// Material balance, White minus Black, in pawns.
pub fn material_balance(pos: &Chess) -> i32 {
    let board = pos.board();
    board
        .occupied()
        .into_iter()
        .filter_map(|sq| board.piece_at(sq))
        .map(|piece| {
            let value = PieceKind::from(piece.role).value();
            if piece.color.is_white() {
                value
            } else {
                -value
            }
        })
        .sum()
}

/// Knights, bishops, rooks and queens of both colours.
pub fn minor_major_count(pos: &Chess) -> usize {
    let board = pos.board();
    board
        .occupied()
        .into_iter()
        .filter_map(|sq| board.piece_at(sq))
        .filter(|piece| PieceKind::from(piece.role).is_minor_or_major())
        .count()
}

/// Owner and type of the piece on a square given by name (`"e4"`).
pub fn piece_on(pos: &Chess, square: &str) -> Option<(Side, PieceKind)> {
    let sq: Square = square.parse().ok()?;
    pos.board()
        .piece_at(sq)
        .map(|piece| (piece.color.into(), piece.role.into()))
}

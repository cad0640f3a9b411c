//! Rules collaborator for game review.
//!
//! Everything that needs to know the rules of chess lives here: transcript
//! parsing, the position timeline of a loaded game, terminal detection,
//! move-notation conversion, board inspection and the static opening table.
//! Move legality and notation are delegated to `shakmaty`.

pub mod error;
pub mod game_data;
pub mod openings;
pub mod pgn;
pub mod rules;
pub mod timeline;

pub use error::GameLoadError;
pub use game_data::GameHeaders;
pub use openings::{OpeningLine, OpeningMatcher, OpeningRef};
pub use rules::{PieceKind, Side, TerminalStatus};
pub use timeline::{GameTimeline, MoveRecord, PositionSnapshot};

//! Game loading errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameLoadError {
    #[error("Transcript contains no moves")]
    EmptyTranscript,

    #[error("Invalid SAN '{san}' at ply {ply}")]
    InvalidSan { ply: usize, san: String },

    #[error("Illegal move '{san}' at ply {ply}: {reason}")]
    IllegalMove {
        ply: usize,
        san: String,
        reason: String,
    },

    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("Transcript pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

use serde::{Deserialize, Serialize};

/// PGN header tags retained with a loaded game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHeaders {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub event: Option<String>,
    pub date: Option<String>,
    pub eco: Option<String>,
    /// Custom start position from a `[FEN]` tag.
    pub start_fen: Option<String>,
}

impl GameHeaders {
    pub fn unknown() -> Self {
        Self {
            white: "Unknown".to_string(),
            black: "Unknown".to_string(),
            result: "*".to_string(),
            ..Self::default()
        }
    }
}

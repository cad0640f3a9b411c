//! Static opening table with longest-prefix lookup.

use serde::{Deserialize, Serialize};

/// A named opening: its defining SAN sequence from the standard start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningLine {
    /// Space-separated SAN, no move numbers.
    pub moves: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The opening a game was matched against, as attached to a classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningRef {
    pub name: String,
    pub description: String,
    /// Half-moves in the matched line.
    pub ply_count: usize,
}

macro_rules! opening {
    ($moves:expr, $name:expr, $desc:expr $(,)?) => {
        OpeningLine {
            moves: $moves,
            name: $name,
            description: $desc,
        }
    };
}

pub const OPENING_LINES: &[OpeningLine] = &[
    opening!(
        "e4",
        "King's Pawn Opening",
        "White stakes a claim in the center and frees the queen and bishop.",
    ),
    opening!(
        "d4",
        "Queen's Pawn Opening",
        "White occupies the center with the d-pawn, protected by the queen.",
    ),
    opening!("c4", "English Opening", "A flank opening fighting for d5 from the side."),
    opening!("Nf3", "Reti Opening", "A flexible knight development that keeps pawn options open."),
    opening!("e4 e5", "Open Game", "Symmetrical central pawns lead to open, tactical play."),
    opening!(
        "e4 e5 Nf3 Nc6",
        "King's Knight Opening",
        "Both sides develop knights toward the center.",
    ),
    opening!("e4 e5 Nf3 Nc6 Bc4", "Italian Game", "The bishop eyes the weak f7 square."),
    opening!(
        "e4 e5 Nf3 Nc6 Bc4 Bc5",
        "Giuoco Piano",
        "A quiet Italian with both bishops on active diagonals.",
    ),
    opening!(
        "e4 e5 Nf3 Nc6 Bc4 Nf6",
        "Two Knights Defense",
        "Black counterattacks e4 instead of mirroring the bishop.",
    ),
    opening!("e4 e5 Nf3 Nc6 Bb5", "Ruy Lopez", "The bishop pressures the knight that defends e5."),
    opening!(
        "e4 e5 Nf3 Nc6 Bb5 a6",
        "Ruy Lopez, Morphy Defense",
        "Black immediately questions the bishop.",
    ),
    opening!(
        "e4 e5 Nf3 Nc6 Bb5 Nf6",
        "Ruy Lopez, Berlin Defense",
        "A solid defense known for the endgame after early queen trades.",
    ),
    opening!("e4 e5 Nf3 Nc6 d4", "Scotch Game", "White opens the center at once."),
    opening!("e4 e5 Nf3 Nf6", "Petrov's Defense", "Black mirrors the knight attack on the e-pawn."),
    opening!(
        "e4 e5 f4",
        "King's Gambit",
        "White offers the f-pawn for rapid development and central control.",
    ),
    opening!("e4 c5", "Sicilian Defense", "An asymmetrical reply fighting for d4 from the flank."),
    opening!(
        "e4 c5 Nf3 d6",
        "Sicilian Defense, Modern Variations",
        "Black prepares ...Nf6 while controlling e5.",
    ),
    opening!(
        "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3",
        "Sicilian Defense, Open",
        "White opens the d-file and develops with tempo on e4.",
    ),
    opening!(
        "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 a6",
        "Sicilian Defense, Najdorf Variation",
        "The flexible ...a6 controls b5 and prepares queenside expansion.",
    ),
    opening!(
        "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 g6",
        "Sicilian Defense, Dragon Variation",
        "Black fianchettoes the bishop on the long diagonal.",
    ),
    opening!(
        "e4 c5 Nf3 Nc6",
        "Sicilian Defense, Old Sicilian",
        "Black develops the knight before committing the d-pawn.",
    ),
    opening!(
        "e4 e6",
        "French Defense",
        "Black prepares ...d5 with a solid but cramped pawn chain.",
    ),
    opening!(
        "e4 e6 d4 d5",
        "French Defense, Main Line",
        "Black challenges the center immediately.",
    ),
    opening!(
        "e4 c6",
        "Caro-Kann Defense",
        "Black prepares ...d5 while keeping the light-squared bishop free.",
    ),
    opening!(
        "e4 c6 d4 d5",
        "Caro-Kann Defense, Main Line",
        "Black strikes at e4 with pawn support.",
    ),
    opening!(
        "e4 d5",
        "Scandinavian Defense",
        "Black challenges e4 at once, at the cost of tempo with the queen.",
    ),
    opening!("e4 d6", "Pirc Defense", "A hypermodern setup inviting White to overextend."),
    opening!(
        "e4 Nf6",
        "Alekhine's Defense",
        "Black provokes the e-pawn forward to attack it later.",
    ),
    opening!("d4 d5", "Closed Game", "Symmetrical queen's pawns lead to slower maneuvering."),
    opening!(
        "d4 d5 c4",
        "Queen's Gambit",
        "White offers the c-pawn to deflect Black's central pawn.",
    ),
    opening!(
        "d4 d5 c4 e6",
        "Queen's Gambit Declined",
        "Black keeps the center and accepts a passive bishop.",
    ),
    opening!(
        "d4 d5 c4 dxc4",
        "Queen's Gambit Accepted",
        "Black takes the pawn and aims to return it for free development.",
    ),
    opening!(
        "d4 d5 c4 c6",
        "Slav Defense",
        "Black supports d5 while keeping the c8 bishop's diagonal open.",
    ),
    opening!("d4 Nf6", "Indian Defense", "Black controls e4 with a piece rather than a pawn."),
    opening!(
        "d4 Nf6 c4 g6",
        "King's Indian Defense",
        "Black fianchettoes and allows White a broad center.",
    ),
    opening!(
        "d4 Nf6 c4 e6 Nc3 Bb4",
        "Nimzo-Indian Defense",
        "The pin on c3 fights for control of e4.",
    ),
    opening!(
        "d4 Nf6 c4 e6 Nf3 b6",
        "Queen's Indian Defense",
        "Black fianchettoes the queen's bishop to watch e4.",
    ),
    opening!("d4 f5", "Dutch Defense", "Black grabs e4 with the f-pawn in an unbalanced fight."),
    opening!("d4 d5 Bf4", "London System", "A solid setup with the bishop outside the pawn chain."),
];

/// Strip check, mate and annotation suffixes so `Qh5+` matches `Qh5`.
fn bare_san(san: &str) -> &str {
    san.trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'))
}

#[derive(Debug, Clone)]
pub struct OpeningMatcher {
    lines: Vec<(Vec<&'static str>, OpeningLine)>,
}

impl Default for OpeningMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OpeningMatcher {
    /// Matcher over the built-in opening table.
    pub fn new() -> Self {
        Self::with_lines(OPENING_LINES)
    }

    pub fn with_lines(lines: &[OpeningLine]) -> Self {
        Self {
            lines: lines
                .iter()
                .map(|line| (line.moves.split_whitespace().collect(), *line))
                .collect(),
        }
    }

    /// Longest table line that is a prefix of `played`. Earlier entries win ties.
    pub fn lookup<S: AsRef<str>>(&self, played: &[S]) -> Option<OpeningRef> {
        let mut best: Option<(&[&str], &OpeningLine)> = None;
        for (moves, line) in &self.lines {
            if moves.is_empty() || moves.len() > played.len() {
                continue;
            }
            let is_prefix = moves
                .iter()
                .zip(played)
                .all(|(expected, actual)| *expected == bare_san(actual.as_ref()));
            if !is_prefix {
                continue;
            }
            match best {
                Some((current, _)) if current.len() >= moves.len() => {}
                _ => best = Some((moves.as_slice(), line)),
            }
        }

        best.map(|(moves, line)| OpeningRef {
            name: line.name.to_string(),
            description: line.description.to_string(),
            ply_count: moves.len(),
        })
    }
}

//! Tier assignment as an ordered rule table: the first rule that returns a
//! tier wins.

use super::Tier;

/// Half-moves eligible for the Book tier
pub const BOOK_PLIES: usize = 6;
pub const BOOK_MAX_ABS_LOSS: f64 = 0.5;

/// Threshold ladder on cp loss (pawns), checked in order.
pub const LADDER: &[(f64, Tier)] = &[
    (-2.0, Tier::Brilliant),
    (-1.0, Tier::Great),
    (0.4, Tier::Best),
    (1.2, Tier::Good),
    (2.5, Tier::Inaccuracy),
    (5.0, Tier::Mistake),
];

#[derive(Debug, Clone, Copy)]
pub struct TierInput {
    pub ply: usize,
    pub cp_loss: f64,
    /// The played move has the engine-best move's from/to squares
    pub matches_engine: bool,
}

pub type TierRule = fn(&TierInput) -> Option<Tier>;

pub const TIER_RULES: &[(&str, TierRule)] = &[
    ("book", book_rule),
    ("engine_match", engine_match_rule),
    ("ladder", ladder_rule),
];

pub fn assign_tier(input: &TierInput) -> Tier {
    TIER_RULES
        .iter()
        .find_map(|(_, rule)| rule(input))
        .unwrap_or(Tier::Blunder)
}

fn book_rule(input: &TierInput) -> Option<Tier> {
    (input.ply < BOOK_PLIES && input.cp_loss.abs() < BOOK_MAX_ABS_LOSS).then_some(Tier::Book)
}

/// The engine's own choice is never worse than Best, whatever the next
/// evaluation says.
fn engine_match_rule(input: &TierInput) -> Option<Tier> {
    if !input.matches_engine {
        return None;
    }
    Some(if input.cp_loss <= -2.0 {
        Tier::Brilliant
    } else if input.cp_loss <= -1.0 {
        Tier::Great
    } else {
        Tier::Best
    })
}

fn ladder_rule(input: &TierInput) -> Option<Tier> {
    Some(
        LADDER
            .iter()
            .find(|(limit, _)| input.cp_loss <= *limit)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Blunder),
    )
}

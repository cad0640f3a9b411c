//! Per-player tallies over a classified game.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chess_core::Side;

use crate::classifier::{Classification, Tier};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub moves: u32,
    pub tiers: BTreeMap<Tier, u32>,
    /// Average positive cp loss, pawns
    pub average_loss: f64,
    pub accuracy: f64,
}

impl PlayerSummary {
    pub fn count(&self, tier: Tier) -> u32 {
        self.tiers.get(&tier).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub white: PlayerSummary,
    pub black: PlayerSummary,
}

impl ReviewSummary {
    /// `first` is the side that played half-move 0.
    pub fn from_classifications(classifications: &[Classification], first: Side) -> Self {
        let mut white = Tally::default();
        let mut black = Tally::default();
        for c in classifications {
            let tally = match c.mover(first) {
                Side::White => &mut white,
                Side::Black => &mut black,
            };
            tally.add(c);
        }
        Self {
            white: white.finish(),
            black: black.finish(),
        }
    }

    pub fn side(&self, side: Side) -> &PlayerSummary {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

#[derive(Default)]
struct Tally {
    moves: u32,
    total_loss: f64,
    tiers: BTreeMap<Tier, u32>,
}

impl Tally {
    fn add(&mut self, c: &Classification) {
        self.moves += 1;
        self.total_loss += c.cp_loss.max(0.0);
        *self.tiers.entry(c.tier).or_insert(0) += 1;
    }

    fn finish(self) -> PlayerSummary {
        let average_loss = if self.moves == 0 {
            0.0
        } else {
            self.total_loss / f64::from(self.moves)
        };
        PlayerSummary {
            moves: self.moves,
            tiers: self.tiers,
            average_loss,
            accuracy: calculate_accuracy(average_loss),
        }
    }
}

/// Accuracy from average loss in pawns: `100 * sqrt(1 / (1 + acpl))`.
pub fn calculate_accuracy(average_loss: f64) -> f64 {
    let accuracy = 100.0 * (1.0 / (1.0 + average_loss.max(0.0))).sqrt();
    accuracy.clamp(0.0, 100.0)
}

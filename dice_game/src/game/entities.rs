use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::wallet::ClientId;

/// Number of faces on each die.
pub const DIE_FACES: u8 = 6;

/// The sum that loses for every bet type.
pub const HOUSE_SUM: u8 = 7;

/// Which side of seven a wager backs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BetType {
    /// Wins when the sum is below seven.
    #[serde(rename = "lt7")]
    Under,
    /// Wins when the sum is above seven.
    #[serde(rename = "gt7")]
    Over,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under => "lt7",
            Self::Over => "gt7",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bet type string that is neither `lt7` nor `gt7`.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid bet type '{0}'")]
pub struct InvalidBetType(pub String);

impl FromStr for BetType {
    type Err = InvalidBetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt7" => Ok(Self::Under),
            "gt7" => Ok(Self::Over),
            other => Err(InvalidBetType(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Win => "win",
            Self::Lose => "lose",
        };
        write!(f, "{repr}")
    }
}

/// A validated wager. Lives for one request only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wager {
    pub client_id: ClientId,
    /// Stake in the smallest currency unit; always positive.
    pub amount: i64,
    pub bet_type: BetType,
}

/// Faces shown by the two dice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiceRoll {
    pub die1: u8,
    pub die2: u8,
}

impl DiceRoll {
    pub fn new(die1: u8, die2: u8) -> Self {
        Self { die1, die2 }
    }

    pub fn sum(&self) -> u8 {
        self.die1.saturating_add(self.die2)
    }

    pub fn is_valid(&self) -> bool {
        (1..=DIE_FACES).contains(&self.die1) && (1..=DIE_FACES).contains(&self.die2)
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {} = {}", self.die1, self.die2, self.sum())
    }
}

/// Result of resolving one wager.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundOutcome {
    pub roll: DiceRoll,
    pub outcome: Outcome,
    /// Net winnings on top of the returned stake; zero on a loss.
    pub winnings: i64,
}

impl RoundOutcome {
    pub fn is_win(&self) -> bool {
        self.outcome == Outcome::Win
    }
}

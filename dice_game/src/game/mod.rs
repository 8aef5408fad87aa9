//! Two-dice over/under-seven game.
//!
//! Resolution is a pure function of the bet and the faces rolled; the only
//! impure piece is the [`DiceRoller`].

pub mod entities;
pub mod resolver;
pub mod roller;

pub use entities::{BetType, DiceRoll, InvalidBetType, Outcome, RoundOutcome, Wager};
pub use resolver::{RoundError, RoundResolver, RoundResult, resolve, theoretical_rtp};
pub use roller::{DiceRoller, SeededRoller};

//! Round resolution: over/under seven with a 1:1 payout.

use std::{fmt, sync::Arc};

use log::debug;

use super::{
    entities::{BetType, DIE_FACES, DiceRoll, HOUSE_SUM, Outcome, RoundOutcome},
    roller::{DiceRoller, SeededRoller},
};

/// Resolution failures. Unreachable with a well-behaved roller and a
/// validated wager, but the engine must still handle them.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum RoundError {
    #[error("die face {0} is outside 1..=6")]
    InvalidDie(u8),
    #[error("payout for stake {0} overflows")]
    PayoutOverflow(i64),
}

pub type RoundResult<T> = Result<T, RoundError>;

/// Decide a wager given the faces rolled.
///
/// A sum of seven loses for both bet types. Otherwise the wager wins when
/// the sum falls on the side it backs, paying net winnings equal to the
/// stake.
///
/// # Errors
///
/// * `RoundError::InvalidDie` - A face outside 1..=6
/// * `RoundError::PayoutOverflow` - Stake plus winnings does not fit in `i64`
pub fn resolve(bet_type: BetType, amount: i64, roll: DiceRoll) -> RoundResult<RoundOutcome> {
    for face in [roll.die1, roll.die2] {
        if !(1..=DIE_FACES).contains(&face) {
            return Err(RoundError::InvalidDie(face));
        }
    }

    let sum = roll.sum();
    let won = match bet_type {
        _ if sum == HOUSE_SUM => false,
        BetType::Under => sum < HOUSE_SUM,
        BetType::Over => sum > HOUSE_SUM,
    };

    let (outcome, winnings) = if won {
        // The credit returns the stake plus winnings; both must fit.
        amount
            .checked_mul(2)
            .ok_or(RoundError::PayoutOverflow(amount))?;
        (Outcome::Win, amount)
    } else {
        (Outcome::Lose, 0)
    };

    Ok(RoundOutcome {
        roll,
        outcome,
        winnings,
    })
}

/// Probability that a wager of `bet_type` wins.
pub fn win_probability(bet_type: BetType) -> f64 {
    let faces = u32::from(DIE_FACES);
    let winning = (1..=DIE_FACES)
        .flat_map(|a| (1..=DIE_FACES).map(move |b| DiceRoll::new(a, b)))
        .filter(|roll| matches!(resolve(bet_type, 1, *roll), Ok(r) if r.is_win()))
        .count();
    winning as f64 / f64::from(faces * faces)
}

/// Long-run fraction of the amount wagered that is paid back to players.
///
/// A win returns twice the stake, so this is `2 * P(win)`: 30/36 for either
/// bet type.
pub fn theoretical_rtp(bet_type: BetType) -> f64 {
    2.0 * win_probability(bet_type)
}

/// Rolls the dice and resolves wagers.
#[derive(Clone)]
pub struct RoundResolver {
    roller: Arc<dyn DiceRoller>,
}

impl RoundResolver {
    pub fn new(roller: Arc<dyn DiceRoller>) -> Self {
        Self { roller }
    }

    /// Roll and resolve one wager.
    pub fn play_round(&self, bet_type: BetType, amount: i64) -> RoundResult<RoundOutcome> {
        let roll = self.roller.roll();
        let result = resolve(bet_type, amount, roll)?;
        debug!(
            "Rolled {}. Bet: {} ({}). Outcome: {}, net winnings: {}",
            roll, bet_type, amount, result.outcome, result.winnings
        );
        Ok(result)
    }
}

impl Default for RoundResolver {
    fn default() -> Self {
        Self::new(Arc::new(SeededRoller::from_entropy()))
    }
}

impl fmt::Debug for RoundResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seven_loses_for_both_sides() {
        for bet in [BetType::Under, BetType::Over] {
            let r = resolve(bet, 50, DiceRoll::new(3, 4)).unwrap();
            assert_eq!(r.outcome, Outcome::Lose);
            assert_eq!(r.winnings, 0);
        }
    }

    #[test]
    fn test_under_wins_on_low_sum() {
        let r = resolve(BetType::Under, 50, DiceRoll::new(1, 3)).unwrap();
        assert_eq!(r.outcome, Outcome::Win);
        assert_eq!(r.winnings, 50);

        let r = resolve(BetType::Over, 50, DiceRoll::new(1, 3)).unwrap();
        assert_eq!(r.outcome, Outcome::Lose);
    }

    #[test]
    fn test_over_wins_on_high_sum() {
        let r = resolve(BetType::Over, 20, DiceRoll::new(6, 6)).unwrap();
        assert_eq!(r.outcome, Outcome::Win);
        assert_eq!(r.winnings, 20);

        let r = resolve(BetType::Under, 20, DiceRoll::new(4, 5)).unwrap();
        assert_eq!(r.outcome, Outcome::Lose);
        assert_eq!(r.winnings, 0);
    }

    #[test]
    fn test_invalid_faces_are_rejected() {
        assert_eq!(
            resolve(BetType::Under, 10, DiceRoll::new(0, 3)),
            Err(RoundError::InvalidDie(0))
        );
        assert_eq!(
            resolve(BetType::Over, 10, DiceRoll::new(2, 9)),
            Err(RoundError::InvalidDie(9))
        );
    }

    #[test]
    fn test_payout_overflow_is_rejected() {
        assert_eq!(
            resolve(BetType::Under, i64::MAX, DiceRoll::new(1, 1)),
            Err(RoundError::PayoutOverflow(i64::MAX))
        );
        // A losing wager pays nothing, so it cannot overflow
        assert!(resolve(BetType::Over, i64::MAX, DiceRoll::new(1, 1)).is_ok());
    }

    #[test]
    fn test_theoretical_rtp() {
        for bet in [BetType::Under, BetType::Over] {
            assert!((win_probability(bet) - 15.0 / 36.0).abs() < 1e-12);
            assert!((theoretical_rtp(bet) - 30.0 / 36.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_resolver_uses_roller() {
        let resolver = RoundResolver::new(Arc::new(crate::mocks::ScriptedRoller::new([(2, 2)])));
        let r = resolver.play_round(BetType::Under, 50).unwrap();
        assert_eq!(r.roll, DiceRoll::new(2, 2));
        assert!(r.is_win());
    }

    proptest! {
        #[test]
        fn prop_round_correctness(
            die1 in 1u8..=6,
            die2 in 1u8..=6,
            amount in 1i64..1_000_000,
            over in any::<bool>(),
        ) {
            let bet = if over { BetType::Over } else { BetType::Under };
            let r = resolve(bet, amount, DiceRoll::new(die1, die2)).unwrap();
            let sum = die1 + die2;

            let should_win = match bet {
                BetType::Under => sum < 7,
                BetType::Over => sum > 7,
            };
            prop_assert_eq!(r.is_win(), should_win);
            prop_assert_eq!(r.winnings, if should_win { amount } else { 0 });
            if sum == 7 {
                prop_assert_eq!(r.outcome, Outcome::Lose);
            }
        }
    }
}

//! Randomness source for dice rolls.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Mutex;

use super::entities::{DIE_FACES, DiceRoll};

/// Produces two independent faces per call.
pub trait DiceRoller: Send + Sync {
    fn roll(&self) -> DiceRoll;
}

/// Uniform roller over a single PRNG seeded once per process.
pub struct SeededRoller {
    rng: Mutex<StdRng>,
}

impl SeededRoller {
    /// Seed from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic roller, for reproducible simulations.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SeededRoller {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl DiceRoller for SeededRoller {
    fn roll(&self) -> DiceRoll {
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        DiceRoll::new(
            rng.random_range(1..=DIE_FACES),
            rng.random_range(1..=DIE_FACES),
        )
    }
}

//! Elimination-mode health tracking

use serde::{Deserialize, Serialize};

/// Result of a single mistake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Health dropped and the player is still in
    Damaged { remaining: u32 },
    /// This mistake took the last point of health
    Eliminated,
    /// The player was already out; nothing changed
    AlreadyEliminated,
}

/// Health of one participant
///
/// `current` only ever goes down, and `eliminated` is set exactly when it
/// reaches zero and never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    current: u32,
    max: u32,
    eliminated: bool,
    mistakes: u32,
}

impl HealthState {
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            eliminated: max == 0,
            mistakes: 0,
        }
    }

    /// Apply one mistake; the only way health changes
    pub fn take_hit(&mut self) -> DamageOutcome {
        if self.eliminated {
            return DamageOutcome::AlreadyEliminated;
        }

        self.mistakes += 1;
        self.current = self.current.saturating_sub(1);
        if self.current == 0 {
            self.eliminated = true;
            DamageOutcome::Eliminated
        } else {
            DamageOutcome::Damaged {
                remaining: self.current,
            }
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_hits_eliminate() {
        let mut health = HealthState::new(3);
        assert_eq!(health.take_hit(), DamageOutcome::Damaged { remaining: 2 });
        assert_eq!(health.take_hit(), DamageOutcome::Damaged { remaining: 1 });
        assert_eq!(health.take_hit(), DamageOutcome::Eliminated);
        assert!(health.is_eliminated());
        assert_eq!(health.current(), 0);
    }

    #[test]
    fn test_hits_after_elimination_are_noops() {
        let mut health = HealthState::new(1);
        assert_eq!(health.take_hit(), DamageOutcome::Eliminated);
        assert_eq!(health.take_hit(), DamageOutcome::AlreadyEliminated);
        assert_eq!(health.mistakes(), 1);
        assert_eq!(health.current(), 0);
    }

    proptest! {
        #[test]
        fn prop_health_never_increases(max in 1u32..10, hits in 0usize..30) {
            let mut health = HealthState::new(max);
            let mut previous = health.current();
            let mut was_eliminated = false;

            for _ in 0..hits {
                health.take_hit();
                prop_assert!(health.current() <= previous);
                prop_assert_eq!(health.is_eliminated(), health.current() == 0);
                if was_eliminated {
                    prop_assert!(health.is_eliminated());
                }
                was_eliminated = health.is_eliminated();
                previous = health.current();
            }
        }
    }
}

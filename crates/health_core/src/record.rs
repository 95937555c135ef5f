//! Health bookkeeping shared by both tracker variants.

use serde::{Deserialize, Serialize};

pub const DEFAULT_STARTING_HEALTH: f32 = 50.0;

/// Result of evaluating a health change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    Survived,
    Died,
    AlreadyDead,
}

/// Current/starting health plus the latched dead flag of one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    starting: f32,
    current: f32,
    dead: bool,
}

impl HealthRecord {
    pub fn new(starting: f32) -> Self {
        Self {
            starting,
            current: starting,
            dead: false,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.starting;
        self.dead = false;
    }

    /// Subtracts `amount` unless the record is already dead. Health is not
    /// clamped here, so an overkill hit leaves it negative.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.dead {
            return DamageOutcome::AlreadyDead;
        }
        self.current -= amount;
        self.evaluate()
    }

    /// Replaces the health ceiling and pulls the current value into `[0, new_max]`.
    pub fn rescale(&mut self, new_max: f32) -> DamageOutcome {
        self.starting = new_max;
        // Lower bound first: a negative ceiling must still win.
        self.current = self.current.max(0.0).min(self.starting);
        if self.dead {
            return DamageOutcome::AlreadyDead;
        }
        self.evaluate()
    }

    fn evaluate(&mut self) -> DamageOutcome {
        if self.current <= 0.0 {
            self.dead = true;
            DamageOutcome::Died
        } else {
            DamageOutcome::Survived
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.starting
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_HEALTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_goes_negative_on_overkill() {
        let mut hp = HealthRecord::new(50.0);
        assert_eq!(DamageOutcome::Survived, hp.apply_damage(30.0));
        assert_eq!(20.0, hp.current());
        assert_eq!(DamageOutcome::Died, hp.apply_damage(25.0));
        assert_eq!(-5.0, hp.current());
        assert!(hp.is_dead());
    }

    #[test]
    fn dead_record_ignores_damage() {
        let mut hp = HealthRecord::new(10.0);
        hp.apply_damage(10.0);
        assert_eq!(DamageOutcome::AlreadyDead, hp.apply_damage(100.0));
        assert_eq!(0.0, hp.current());
    }

    #[test]
    fn reset_restores_starting_health() {
        let mut hp = HealthRecord::new(10.0);
        hp.apply_damage(12.0);
        hp.reset();
        assert_eq!(10.0, hp.current());
        assert!(!hp.is_dead());
    }

    #[test]
    fn rescale_clamps_into_new_range() {
        let mut hp = HealthRecord::new(50.0);
        assert_eq!(DamageOutcome::Survived, hp.rescale(20.0));
        assert_eq!(20.0, hp.current());
        assert_eq!(20.0, hp.max());

        assert_eq!(DamageOutcome::Survived, hp.rescale(80.0));
        assert_eq!(20.0, hp.current());
    }

    #[test]
    fn rescale_to_zero_kills_once() {
        let mut hp = HealthRecord::new(50.0);
        assert_eq!(DamageOutcome::Died, hp.rescale(0.0));
        assert_eq!(DamageOutcome::AlreadyDead, hp.rescale(0.0));
    }

    #[test]
    fn negative_ceiling_does_not_panic() {
        let mut hp = HealthRecord::new(50.0);
        assert_eq!(DamageOutcome::Died, hp.rescale(-5.0));
        assert_eq!(-5.0, hp.current());
    }
}

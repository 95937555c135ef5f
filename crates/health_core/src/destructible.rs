use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::effects::EntityServices;
use crate::pooled::PooledEffectHealthTracker;
use crate::record::DamageOutcome;
use crate::tracker::{HealthTracker, TrackerSettings};

/// Which death strategy an entity uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerVariant {
    /// Spawn a new effect per death; remove or deactivate the owner.
    #[default]
    Transient,
    /// Trigger a prewarmed effect; always remove the owner.
    Pooled,
}

/// Either tracker variant behind one interface.
#[derive(Clone, Debug)]
pub enum Destructible<H> {
    Transient(HealthTracker<H>),
    Pooled(PooledEffectHealthTracker<H>),
}

impl<H: Copy + Eq + Debug> Destructible<H> {
    pub fn new(owner: H, variant: TrackerVariant, settings: TrackerSettings) -> Self {
        match variant {
            TrackerVariant::Transient => Self::Transient(HealthTracker::new(owner, settings)),
            TrackerVariant::Pooled => Self::Pooled(PooledEffectHealthTracker::new(owner, settings)),
        }
    }

    pub fn variant(&self) -> TrackerVariant {
        match self {
            Self::Transient(_) => TrackerVariant::Transient,
            Self::Pooled(_) => TrackerVariant::Pooled,
        }
    }

    pub fn on_create<S>(&mut self, services: &mut S)
    where
        S: EntityServices<Handle = H>,
    {
        match self {
            Self::Transient(tracker) => tracker.on_create(),
            Self::Pooled(tracker) => tracker.on_create(services),
        }
    }

    pub fn on_activate(&mut self) {
        match self {
            Self::Transient(tracker) => tracker.on_activate(),
            Self::Pooled(tracker) => tracker.on_activate(),
        }
    }

    pub fn on_destroy<S>(&mut self, services: &mut S)
    where
        S: EntityServices<Handle = H>,
    {
        if let Self::Pooled(tracker) = self {
            tracker.on_destroy(services);
        }
    }

    /// Effect handle still owned by the tracker and the delay before it may
    /// be removed. Only the pooled variant owns one.
    pub fn pending_release(&self) -> Option<(H, Option<Duration>)> {
        match self {
            Self::Transient(_) => None,
            Self::Pooled(tracker) => tracker.pending_release(),
        }
    }

    pub fn take_damage<S>(&mut self, amount: f32, services: &mut S) -> DamageOutcome
    where
        S: EntityServices<Handle = H>,
    {
        match self {
            Self::Transient(tracker) => tracker.take_damage(amount, services),
            Self::Pooled(tracker) => tracker.take_damage(amount, services),
        }
    }

    pub fn set_health<S>(&mut self, new_max: f32, services: &mut S) -> DamageOutcome
    where
        S: EntityServices<Handle = H>,
    {
        match self {
            Self::Transient(tracker) => tracker.set_health(new_max, services),
            Self::Pooled(tracker) => tracker.set_health(new_max, services),
        }
    }

    pub fn owner(&self) -> H {
        match self {
            Self::Transient(tracker) => tracker.owner(),
            Self::Pooled(tracker) => tracker.owner(),
        }
    }

    pub fn current_health(&self) -> f32 {
        match self {
            Self::Transient(tracker) => tracker.current_health(),
            Self::Pooled(tracker) => tracker.current_health(),
        }
    }

    pub fn max_health(&self) -> f32 {
        match self {
            Self::Transient(tracker) => tracker.max_health(),
            Self::Pooled(tracker) => tracker.max_health(),
        }
    }

    pub fn is_dead(&self) -> bool {
        match self {
            Self::Transient(tracker) => tracker.is_dead(),
            Self::Pooled(tracker) => tracker.is_dead(),
        }
    }
}

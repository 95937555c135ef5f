//! Health tracker that spawns a fresh effect instance on death.

use std::fmt::Debug;

use bevy::math::Quat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::effects::{effect_lifetime, EffectTemplate, EntityServices};
use crate::record::{DamageOutcome, HealthRecord, DEFAULT_STARTING_HEALTH};

/// Authoring-time settings for a tracked entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_starting_health")]
    pub starting_health: f32,
    #[serde(default)]
    pub effect: Option<EffectTemplate>,
    /// Remove the entity on death instead of deactivating it. Pooled trackers
    /// always remove.
    #[serde(default = "default_destroy_on_death")]
    pub destroy_on_death: bool,
}

fn default_starting_health() -> f32 {
    DEFAULT_STARTING_HEALTH
}

fn default_destroy_on_death() -> bool {
    true
}

impl TrackerSettings {
    pub fn new(starting_health: f32) -> Self {
        Self {
            starting_health,
            ..Default::default()
        }
    }

    pub fn with_effect(mut self, effect: EffectTemplate) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn deactivate_on_death(mut self) -> Self {
        self.destroy_on_death = false;
        self
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            starting_health: DEFAULT_STARTING_HEALTH,
            effect: None,
            destroy_on_death: true,
        }
    }
}

/// Damage and death for one entity. The entity is re-armed every time it
/// becomes active, so a deactivated entity can be pooled and reused.
#[derive(Clone, Debug)]
pub struct HealthTracker<H> {
    owner: H,
    record: HealthRecord,
    effect: Option<EffectTemplate>,
    destroy_on_death: bool,
}

impl<H: Copy + Eq + Debug> HealthTracker<H> {
    pub fn new(owner: H, settings: TrackerSettings) -> Self {
        Self {
            owner,
            record: HealthRecord::new(settings.starting_health),
            effect: settings.effect,
            destroy_on_death: settings.destroy_on_death,
        }
    }

    pub fn on_create(&mut self) {
        self.record.reset();
    }

    pub fn on_activate(&mut self) {
        self.record.reset();
        debug!(
            target: "health.tracker",
            owner = ?self.owner,
            health = self.record.current(),
            "re-armed"
        );
    }

    pub fn take_damage<S>(&mut self, amount: f32, services: &mut S) -> DamageOutcome
    where
        S: EntityServices<Handle = H>,
    {
        let outcome = self.record.apply_damage(amount);
        match outcome {
            DamageOutcome::AlreadyDead => {}
            DamageOutcome::Survived => {
                info!(
                    target: "health.tracker",
                    owner = ?self.owner,
                    amount,
                    current = self.record.current(),
                    max = self.record.max(),
                    "damage applied"
                );
            }
            DamageOutcome::Died => self.die(services),
        }
        outcome
    }

    /// Replaces the health ceiling at runtime. Death still goes through the
    /// normal death handling.
    pub fn set_health<S>(&mut self, new_max: f32, services: &mut S) -> DamageOutcome
    where
        S: EntityServices<Handle = H>,
    {
        let outcome = self.record.rescale(new_max);
        info!(
            target: "health.tracker",
            owner = ?self.owner,
            max = new_max,
            current = self.record.current(),
            "health rescaled"
        );
        if outcome == DamageOutcome::Died {
            self.die(services);
        }
        outcome
    }

    fn die<S>(&mut self, services: &mut S)
    where
        S: EntityServices<Handle = H>,
    {
        info!(
            target: "health.tracker",
            owner = ?self.owner,
            current = self.record.current(),
            "destroyed"
        );

        if let Some(template) = &self.effect {
            let position = services.position(self.owner);
            let effect = services.instantiate(template, position, Quat::IDENTITY);
            let lifetime = effect_lifetime(services.particles(effect).as_ref());
            debug!(
                target: "health.tracker",
                ?effect,
                template = %template.name,
                lifetime_secs = lifetime.as_secs_f32(),
                "death effect spawned"
            );
            services.remove(effect, Some(lifetime));
        }

        if self.destroy_on_death {
            services.remove(self.owner, None);
        } else {
            services.set_active(self.owner, false);
        }
    }

    pub fn owner(&self) -> H {
        self.owner
    }

    pub fn current_health(&self) -> f32 {
        self.record.current()
    }

    pub fn max_health(&self) -> f32 {
        self.record.max()
    }

    pub fn is_dead(&self) -> bool {
        self.record.is_dead()
    }

    pub fn destroys_on_death(&self) -> bool {
        self.destroy_on_death
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::math::Vec3;

    use super::*;
    use crate::sim::{SimHandle, SimWorld, TraceEvent};

    fn spawn(world: &mut SimWorld, settings: TrackerSettings) -> HealthTracker<SimHandle> {
        let owner = world.spawn_entity("crate", Vec3::new(1.0, 0.0, 2.0));
        let mut tracker = HealthTracker::new(owner, settings);
        tracker.on_create();
        tracker
    }

    fn effect_spawns(world: &SimWorld) -> usize {
        world
            .trace()
            .iter()
            .filter(|event| matches!(event, TraceEvent::EffectSpawned { .. }))
            .count()
    }

    #[test]
    fn overkill_removes_owner_once() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(50.0));
        let owner = tracker.owner();

        assert_eq!(DamageOutcome::Survived, tracker.take_damage(30.0, &mut world));
        assert_eq!(20.0, tracker.current_health());
        assert_eq!(DamageOutcome::Died, tracker.take_damage(25.0, &mut world));
        assert_eq!(-5.0, tracker.current_health());
        assert!(!world.contains(owner));

        for _ in 0..3 {
            assert_eq!(DamageOutcome::AlreadyDead, tracker.take_damage(10.0, &mut world));
        }
        assert_eq!(-5.0, tracker.current_health());
        assert_eq!(1, world.removal_count(owner));
    }

    #[test]
    fn deactivates_instead_of_removing_when_configured() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).deactivate_on_death());
        let owner = tracker.owner();

        tracker.take_damage(10.0, &mut world);
        assert!(!tracker.destroys_on_death());
        assert!(world.contains(owner));
        assert!(!world.is_active(owner));
        assert!(tracker.is_dead());
    }

    #[test]
    fn reactivation_rearms() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).deactivate_on_death());
        tracker.take_damage(15.0, &mut world);

        tracker.on_activate();
        assert!(!tracker.is_dead());
        assert_eq!(10.0, tracker.current_health());
        assert_eq!(DamageOutcome::Survived, tracker.take_damage(4.0, &mut world));
    }

    #[test]
    fn no_template_means_no_effect_calls() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(5.0));
        tracker.take_damage(5.0, &mut world);
        assert_eq!(0, effect_spawns(&world));
        assert_eq!(0, world.pending_removals());
    }

    #[test]
    fn particle_effect_removed_after_its_playback() {
        let mut world = SimWorld::new();
        let template = EffectTemplate::new("burst").with_particles(2.0, 1.5);
        let mut tracker = spawn(&mut world, TrackerSettings::new(5.0).with_effect(template));
        tracker.take_damage(5.0, &mut world);

        assert_eq!(1, effect_spawns(&world));
        assert_eq!(Some(Duration::from_millis(3500)), world.next_removal_at());
    }

    #[test]
    fn effect_without_particles_uses_fallback() {
        let mut world = SimWorld::new();
        let template = EffectTemplate::new("thud").with_audio("thud.ogg");
        let mut tracker = spawn(&mut world, TrackerSettings::new(5.0).with_effect(template));
        tracker.take_damage(5.0, &mut world);

        assert_eq!(Some(Duration::from_secs(5)), world.next_removal_at());
    }

    #[test]
    fn infinite_particle_time_uses_fallback() {
        let mut world = SimWorld::new();
        let template = EffectTemplate::new("boom").with_particles(f32::INFINITY, 1.0);
        let mut tracker = spawn(&mut world, TrackerSettings::new(5.0).with_effect(template));

        assert_eq!(DamageOutcome::Died, tracker.take_damage(5.0, &mut world));
        assert_eq!(Some(Duration::from_secs(5)), world.next_removal_at());
    }

    #[test]
    fn effect_spawns_at_owner_position() {
        let mut world = SimWorld::new();
        let template = EffectTemplate::new("burst").with_particles(1.0, 1.0);
        let mut tracker = spawn(&mut world, TrackerSettings::new(5.0).with_effect(template));
        tracker.take_damage(9.0, &mut world);

        let spawned = world.trace().iter().find_map(|event| match event {
            TraceEvent::EffectSpawned { position, .. } => Some(*position),
            _ => None,
        });
        assert_eq!(Some([1.0, 0.0, 2.0]), spawned);
    }

    #[test]
    fn set_health_to_zero_kills_once() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(50.0));
        let owner = tracker.owner();

        assert_eq!(DamageOutcome::Died, tracker.set_health(0.0, &mut world));
        assert_eq!(DamageOutcome::AlreadyDead, tracker.set_health(0.0, &mut world));
        assert_eq!(1, world.removal_count(owner));
    }

    #[test]
    fn set_health_below_current_clamps() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(50.0));
        tracker.set_health(20.0, &mut world);
        assert_eq!(20.0, tracker.current_health());
        assert_eq!(20.0, tracker.max_health());
        assert!(!tracker.is_dead());
    }
}

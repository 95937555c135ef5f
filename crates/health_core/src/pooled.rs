//! Health tracker that pre-instantiates its death effect and triggers it in
//! place, instead of spawning a new instance per death.

use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, info};

use crate::effects::{
    effect_lifetime, AudioPlayback, EffectTemplate, EntityServices, ParticlePlayback,
};
use crate::record::{DamageOutcome, HealthRecord};
use crate::tracker::TrackerSettings;

#[derive(Clone, Debug)]
struct PrewarmedEffect<H> {
    handle: H,
    particles: Option<ParticlePlayback>,
    audio: Option<AudioPlayback>,
    played: bool,
}

/// Single-use tracker: armed once at creation, never re-armed on
/// reactivation, and always removes its owner on death.
#[derive(Clone, Debug)]
pub struct PooledEffectHealthTracker<H> {
    owner: H,
    record: HealthRecord,
    template: Option<EffectTemplate>,
    effect: Option<PrewarmedEffect<H>>,
}

impl<H: Copy + Eq + Debug> PooledEffectHealthTracker<H> {
    pub fn new(owner: H, settings: TrackerSettings) -> Self {
        Self {
            owner,
            record: HealthRecord::new(settings.starting_health),
            template: settings.effect,
            effect: None,
        }
    }

    /// Arms the record and instantiates the effect, inactive, for later use.
    pub fn on_create<S>(&mut self, services: &mut S)
    where
        S: EntityServices<Handle = H>,
    {
        self.record.reset();
        if self.effect.is_some() {
            return;
        }
        let Some(template) = &self.template else {
            return;
        };
        let handle = services.instantiate_inactive(template);
        let particles = services.particles(handle);
        let audio = services.audio(handle);
        debug!(
            target: "health.pooled",
            owner = ?self.owner,
            effect = ?handle,
            template = %template.name,
            has_particles = particles.is_some(),
            has_audio = audio.is_some(),
            "death effect prewarmed"
        );
        self.effect = Some(PrewarmedEffect {
            handle,
            particles,
            audio,
            played: false,
        });
    }

    pub fn on_activate(&mut self) {}

    /// Releases the prewarmed effect. One that already played is left to
    /// finish its playback first.
    pub fn on_destroy<S>(&mut self, services: &mut S)
    where
        S: EntityServices<Handle = H>,
    {
        if let Some((effect, delay)) = self.pending_release() {
            services.remove(effect, delay);
            self.effect = None;
        }
    }

    /// The effect handle still owned by this tracker and when it should go.
    pub fn pending_release(&self) -> Option<(H, Option<Duration>)> {
        self.effect.as_ref().map(|effect| {
            let delay = effect
                .played
                .then(|| effect_lifetime(effect.particles.as_ref()));
            (effect.handle, delay)
        })
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
                    target: "health.pooled",
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

    pub fn set_health<S>(&mut self, new_max: f32, services: &mut S) -> DamageOutcome
    where
        S: EntityServices<Handle = H>,
    {
        let outcome = self.record.rescale(new_max);
        info!(
            target: "health.pooled",
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
            target: "health.pooled",
            owner = ?self.owner,
            current = self.record.current(),
            "destroyed"
        );

        if let Some(effect) = self.effect.as_mut() {
            let position = services.position(self.owner);
            services.move_to(effect.handle, position);
            services.set_active(effect.handle, true);
            if effect.particles.is_some() {
                services.play_particles(effect.handle);
            }
            if effect.audio.is_some() {
                services.play_audio(effect.handle);
            }
            effect.played = true;
        }

        services.remove(self.owner, None);
    }

    pub fn owner(&self) -> H {
        self.owner
    }

    pub fn effect(&self) -> Option<H> {
        self.effect.as_ref().map(|effect| effect.handle)
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
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;
    use crate::sim::{SimHandle, SimWorld, TraceEvent};

    fn spawn(
        world: &mut SimWorld,
        settings: TrackerSettings,
    ) -> PooledEffectHealthTracker<SimHandle> {
        let owner = world.spawn_entity("barrel", Vec3::new(4.0, 0.0, -1.0));
        let mut tracker = PooledEffectHealthTracker::new(owner, settings);
        tracker.on_create(world);
        tracker
    }

    fn explosion() -> EffectTemplate {
        EffectTemplate::new("explosion")
            .with_particles(1.0, 0.5)
            .with_audio("boom.ogg")
    }

    #[test]
    fn effect_is_prewarmed_inactive() {
        let mut world = SimWorld::new();
        let tracker = spawn(&mut world, TrackerSettings::new(20.0).with_effect(explosion()));
        let effect = tracker.effect().unwrap();
        assert!(world.contains(effect));
        assert!(!world.is_active(effect));
    }

    #[test]
    fn death_moves_and_plays_effect() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(20.0).with_effect(explosion()));
        let effect = tracker.effect().unwrap();

        tracker.take_damage(25.0, &mut world);

        assert!(world.is_active(effect));
        assert_eq!(Vec3::new(4.0, 0.0, -1.0), world.position_of(effect));
        assert!(world.is_playing_particles(effect));
        assert!(world.is_playing_audio(effect));
        assert!(!world.contains(tracker.owner()));
    }

    #[test]
    fn missing_audio_is_tolerated() {
        let mut world = SimWorld::new();
        let template = EffectTemplate::new("sparks").with_particles(1.0, 0.5);
        let mut tracker = spawn(&mut world, TrackerSettings::new(1.0).with_effect(template));
        let effect = tracker.effect().unwrap();

        tracker.take_damage(1.0, &mut world);
        assert!(world.is_playing_particles(effect));
        assert!(!world.is_playing_audio(effect));
    }

    #[test]
    fn damage_after_death_is_inert() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).with_effect(explosion()));
        tracker.take_damage(10.0, &mut world);
        let trace_len = world.trace().len();

        assert_eq!(DamageOutcome::AlreadyDead, tracker.take_damage(50.0, &mut world));
        assert_eq!(0.0, tracker.current_health());
        assert_eq!(trace_len, world.trace().len());
    }

    #[test]
    fn always_removes_owner() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).deactivate_on_death());
        tracker.take_damage(10.0, &mut world);
        assert!(!world.contains(tracker.owner()));
    }

    #[test]
    fn reactivation_does_not_rearm() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0));
        tracker.take_damage(4.0, &mut world);
        tracker.on_activate();
        assert_eq!(6.0, tracker.current_health());
    }

    #[test]
    fn teardown_lets_played_effect_finish() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).with_effect(explosion()));
        let effect = tracker.effect().unwrap();
        tracker.take_damage(10.0, &mut world);
        tracker.on_destroy(&mut world);

        assert!(tracker.effect().is_none());
        assert!(world.contains(effect));
        assert_eq!(Some(std::time::Duration::from_millis(1500)), world.next_removal_at());
    }

    #[test]
    fn teardown_releases_unused_effect_immediately() {
        let mut world = SimWorld::new();
        let mut tracker = spawn(&mut world, TrackerSettings::new(10.0).with_effect(explosion()));
        let effect = tracker.effect().unwrap();
        tracker.on_destroy(&mut world);

        assert!(!world.contains(effect));
        assert!(world
            .trace()
            .iter()
            .any(|event| matches!(event, TraceEvent::Removed { entity, .. } if *entity == effect)));
    }
}

//! Engine-free host world. Records every outbound call a tracker makes so
//! scripted runs and tests can inspect them.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::destructible::{Destructible, TrackerVariant};
use crate::effects::{AudioPlayback, EffectTemplate, EntityServices, ParticlePlayback};
use crate::record::DamageOutcome;
use crate::removal::RemovalQueue;
use crate::tracker::TrackerSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimHandle(pub u32);

#[derive(Debug)]
struct SimEntity {
    label: String,
    position: Vec3,
    active: bool,
    template: Option<EffectTemplate>,
    particles_playing: bool,
    audio_playing: bool,
}

/// One observable call into the world, stamped with the world clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Spawned {
        at_ms: u64,
        entity: SimHandle,
        label: String,
        position: [f32; 3],
    },
    Damaged {
        at_ms: u64,
        entity: SimHandle,
        amount: f32,
        current: f32,
    },
    Rescaled {
        at_ms: u64,
        entity: SimHandle,
        max: f32,
        current: f32,
    },
    Died {
        at_ms: u64,
        entity: SimHandle,
    },
    EffectSpawned {
        at_ms: u64,
        effect: SimHandle,
        template: String,
        position: [f32; 3],
        active: bool,
    },
    Moved {
        at_ms: u64,
        entity: SimHandle,
        position: [f32; 3],
    },
    Activated {
        at_ms: u64,
        entity: SimHandle,
    },
    Deactivated {
        at_ms: u64,
        entity: SimHandle,
    },
    ParticlesStarted {
        at_ms: u64,
        effect: SimHandle,
    },
    AudioStarted {
        at_ms: u64,
        effect: SimHandle,
        clip: String,
    },
    RemovalScheduled {
        at_ms: u64,
        entity: SimHandle,
        fire_at_ms: u64,
    },
    Removed {
        at_ms: u64,
        entity: SimHandle,
    },
}

#[derive(Debug, Default)]
pub struct SimWorld {
    clock: Duration,
    next_handle: u32,
    entities: BTreeMap<SimHandle, SimEntity>,
    removals: RemovalQueue<SimHandle>,
    trace: Vec<TraceEvent>,
}

fn millis(time: Duration) -> u64 {
    time.as_millis() as u64
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.clock
    }

    fn at_ms(&self) -> u64 {
        millis(self.clock)
    }

    fn insert(&mut self, entity: SimEntity) -> SimHandle {
        let handle = SimHandle(self.next_handle);
        self.next_handle += 1;
        self.entities.insert(handle, entity);
        handle
    }

    /// Adds a plain, active entity such as the owner of a tracker.
    pub fn spawn_entity(&mut self, label: impl Into<String>, position: Vec3) -> SimHandle {
        let label = label.into();
        let handle = self.insert(SimEntity {
            label: label.clone(),
            position,
            active: true,
            template: None,
            particles_playing: false,
            audio_playing: false,
        });
        self.record(TraceEvent::Spawned {
            at_ms: self.at_ms(),
            entity: handle,
            label,
            position: position.to_array(),
        });
        handle
    }

    fn spawn_effect(
        &mut self,
        template: &EffectTemplate,
        position: Vec3,
        active: bool,
    ) -> SimHandle {
        let handle = self.insert(SimEntity {
            label: template.name.clone(),
            position,
            active,
            template: Some(template.clone()),
            particles_playing: active && template.particles.is_some(),
            audio_playing: active && template.audio.is_some(),
        });
        self.record(TraceEvent::EffectSpawned {
            at_ms: self.at_ms(),
            effect: handle,
            template: template.name.clone(),
            position: position.to_array(),
            active,
        });
        handle
    }

    pub(crate) fn record(&mut self, event: TraceEvent) {
        self.trace.push(event);
    }

    /// Moves the clock forward and removes whatever fell due.
    pub fn advance(&mut self, dt: Duration) -> Vec<SimHandle> {
        self.clock += dt;
        let mut removed = Vec::new();
        for handle in self.removals.drain_due(self.clock) {
            if self.despawn(handle) {
                removed.push(handle);
            }
        }
        removed
    }

    fn despawn(&mut self, handle: SimHandle) -> bool {
        match self.entities.remove(&handle) {
            Some(entity) => {
                debug!(target: "health.sim", ?handle, label = %entity.label, "removed");
                self.record(TraceEvent::Removed {
                    at_ms: self.at_ms(),
                    entity: handle,
                });
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, handle: SimHandle) -> bool {
        self.entities.contains_key(&handle)
    }

    pub fn is_active(&self, handle: SimHandle) -> bool {
        self.entities
            .get(&handle)
            .map(|entity| entity.active)
            .unwrap_or(false)
    }

    pub fn is_playing_particles(&self, handle: SimHandle) -> bool {
        self.entities
            .get(&handle)
            .is_some_and(|entity| entity.particles_playing)
    }

    pub fn is_playing_audio(&self, handle: SimHandle) -> bool {
        self.entities
            .get(&handle)
            .is_some_and(|entity| entity.audio_playing)
    }

    pub fn position_of(&self, handle: SimHandle) -> Vec3 {
        self.position(handle)
    }

    pub fn label(&self, handle: SimHandle) -> Option<&str> {
        self.entities.get(&handle).map(|entity| entity.label.as_str())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    pub fn next_removal_at(&self) -> Option<Duration> {
        self.removals.next_fire_time()
    }

    /// Number of removal requests, immediate or deferred, made for `handle`.
    pub fn removal_count(&self, handle: SimHandle) -> usize {
        self.trace
            .iter()
            .filter(|event| match event {
                TraceEvent::Removed { entity, .. } => *entity == handle,
                TraceEvent::RemovalScheduled { entity, .. } => *entity == handle,
                _ => false,
            })
            .count()
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }
}

impl EntityServices for SimWorld {
    type Handle = SimHandle;

    fn position(&self, entity: SimHandle) -> Vec3 {
        self.entities
            .get(&entity)
            .map(|entity| entity.position)
            .unwrap_or(Vec3::ZERO)
    }

    fn instantiate(
        &mut self,
        template: &EffectTemplate,
        position: Vec3,
        _rotation: Quat,
    ) -> SimHandle {
        self.spawn_effect(template, position, true)
    }

    fn instantiate_inactive(&mut self, template: &EffectTemplate) -> SimHandle {
        self.spawn_effect(template, Vec3::ZERO, false)
    }

    fn particles(&self, effect: SimHandle) -> Option<ParticlePlayback> {
        self.entities
            .get(&effect)
            .and_then(|entity| entity.template.as_ref())
            .and_then(|template| template.particles)
            .map(ParticlePlayback::from)
    }

    fn audio(&self, effect: SimHandle) -> Option<AudioPlayback> {
        self.entities
            .get(&effect)
            .and_then(|entity| entity.template.as_ref())
            .and_then(|template| template.audio.clone())
            .map(AudioPlayback::from)
    }

    fn move_to(&mut self, entity: SimHandle, position: Vec3) {
        let at_ms = self.at_ms();
        if let Some(target) = self.entities.get_mut(&entity) {
            target.position = position;
            self.record(TraceEvent::Moved {
                at_ms,
                entity,
                position: position.to_array(),
            });
        }
    }

    fn set_active(&mut self, entity: SimHandle, active: bool) {
        let at_ms = self.at_ms();
        if let Some(target) = self.entities.get_mut(&entity) {
            if target.active == active {
                return;
            }
            target.active = active;
            if !active {
                target.particles_playing = false;
                target.audio_playing = false;
            }
            let event = if active {
                TraceEvent::Activated { at_ms, entity }
            } else {
                TraceEvent::Deactivated { at_ms, entity }
            };
            self.record(event);
        }
    }

    fn play_particles(&mut self, effect: SimHandle) {
        let at_ms = self.at_ms();
        if let Some(target) = self.entities.get_mut(&effect) {
            target.particles_playing = true;
            self.record(TraceEvent::ParticlesStarted { at_ms, effect });
        }
    }

    fn play_audio(&mut self, effect: SimHandle) {
        let at_ms = self.at_ms();
        let clip = self
            .audio(effect)
            .map(|audio| audio.clip)
            .unwrap_or_default();
        if let Some(target) = self.entities.get_mut(&effect) {
            target.audio_playing = true;
            self.record(TraceEvent::AudioStarted { at_ms, effect, clip });
        }
    }

    fn remove(&mut self, entity: SimHandle, delay: Option<Duration>) {
        match delay {
            None => {
                self.despawn(entity);
            }
            Some(delay) => {
                let fire_at = self.clock + delay;
                self.removals.schedule(entity, fire_at);
                self.record(TraceEvent::RemovalScheduled {
                    at_ms: self.at_ms(),
                    entity,
                    fire_at_ms: millis(fire_at),
                });
            }
        }
    }
}

/// A [`SimWorld`] plus the trackers living in it.
#[derive(Debug, Default)]
pub struct Scene {
    world: SimWorld,
    trackers: BTreeMap<SimHandle, Destructible<SimHandle>>,
    torn_down: BTreeSet<SimHandle>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        label: impl Into<String>,
        position: Vec3,
        variant: TrackerVariant,
        settings: TrackerSettings,
    ) -> SimHandle {
        let owner = self.world.spawn_entity(label, position);
        let mut tracker = Destructible::new(owner, variant, settings);
        tracker.on_create(&mut self.world);
        self.trackers.insert(owner, tracker);
        owner
    }

    /// Returns `None` when `target` carries no tracker.
    pub fn damage(&mut self, target: SimHandle, amount: f32) -> Option<DamageOutcome> {
        let tracker = self.trackers.get_mut(&target)?;
        let mark = self.world.trace.len();
        let outcome = tracker.take_damage(amount, &mut self.world);
        if outcome != DamageOutcome::AlreadyDead {
            let entry = TraceEvent::Damaged {
                at_ms: self.world.at_ms(),
                entity: target,
                amount,
                current: tracker.current_health(),
            };
            self.note(mark, entry, target, outcome);
        }
        self.reap();
        Some(outcome)
    }

    pub fn set_health(&mut self, target: SimHandle, new_max: f32) -> Option<DamageOutcome> {
        let tracker = self.trackers.get_mut(&target)?;
        let mark = self.world.trace.len();
        let outcome = tracker.set_health(new_max, &mut self.world);
        let entry = TraceEvent::Rescaled {
            at_ms: self.world.at_ms(),
            entity: target,
            max: new_max,
            current: tracker.current_health(),
        };
        self.note(mark, entry, target, outcome);
        self.reap();
        Some(outcome)
    }

    /// Puts the health entry (and the death marker) ahead of the calls the
    /// death handling made.
    fn note(&mut self, mark: usize, entry: TraceEvent, target: SimHandle, outcome: DamageOutcome) {
        let at_ms = self.world.at_ms();
        self.world.trace.insert(mark, entry);
        if outcome == DamageOutcome::Died {
            self.world
                .trace
                .insert(mark + 1, TraceEvent::Died { at_ms, entity: target });
        }
    }

    /// Turns an entity off without touching its health.
    pub fn deactivate(&mut self, target: SimHandle) -> bool {
        if !self.world.is_active(target) {
            return false;
        }
        self.world.set_active(target, false);
        true
    }

    /// Turns an entity back on and re-arms its tracker.
    pub fn reactivate(&mut self, target: SimHandle) -> bool {
        if !self.world.contains(target) || self.world.is_active(target) {
            return false;
        }
        self.world.set_active(target, true);
        if let Some(tracker) = self.trackers.get_mut(&target) {
            tracker.on_activate();
        }
        true
    }

    pub fn advance(&mut self, dt: Duration) {
        self.world.advance(dt);
        self.reap();
    }

    /// Runs the clock until no deferred removal is left.
    pub fn settle(&mut self) {
        while let Some(fire_at) = self.world.next_removal_at() {
            let dt = fire_at.saturating_sub(self.world.now());
            self.advance(dt);
        }
    }

    /// Tears down trackers whose owner has left the world. Their final
    /// state stays readable.
    fn reap(&mut self) {
        let gone: Vec<SimHandle> = self
            .trackers
            .keys()
            .copied()
            .filter(|owner| !self.world.contains(*owner) && !self.torn_down.contains(owner))
            .collect();
        for owner in gone {
            if let Some(tracker) = self.trackers.get_mut(&owner) {
                tracker.on_destroy(&mut self.world);
            }
            self.torn_down.insert(owner);
        }
    }

    pub fn tracker(&self, owner: SimHandle) -> Option<&Destructible<SimHandle>> {
        self.trackers.get(&owner)
    }

    pub fn trackers(&self) -> impl Iterator<Item = &Destructible<SimHandle>> {
        self.trackers.values()
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }
}

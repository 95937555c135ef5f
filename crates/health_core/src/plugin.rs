use std::time::Duration;

use bevy::ecs::component::ComponentId;
use bevy::ecs::world::DeferredWorld;
use bevy::prelude::*;
use bevy::transform::helper::TransformHelper;

use crate::destructible::{Destructible, TrackerVariant};
use crate::effects::{AudioPlayback, EffectTemplate, EntityServices, ParticlePlayback};
use crate::record::DamageOutcome;
use crate::removal::RemovalQueue;
use crate::tracker::TrackerSettings;

/// Wires destructible entities into a Bevy app. Damage arrives through
/// [`DamageEvent`] and [`SetHealthEvent`]; death effects are plain entities
/// tagged with [`EffectInstance`].
pub struct HealthPlugin;

impl Plugin for HealthPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<Time>() {
            app.init_resource::<Time>();
        }

        app.add_event::<DamageEvent>()
            .add_event::<SetHealthEvent>()
            .init_resource::<DeferredRemovals>()
            .add_systems(
                Update,
                (
                    arm_trackers,
                    rearm_reactivated,
                    apply_damage_events,
                    apply_set_health_events,
                    release_expired_effects,
                )
                    .chain(),
            );

        app.world_mut()
            .register_component_hooks::<Damageable>()
            .on_remove(release_prewarmed_effect);
    }
}

#[derive(Event, Clone, Copy, Debug)]
pub struct DamageEvent {
    pub target: Entity,
    pub amount: f32,
}

#[derive(Event, Clone, Copy, Debug)]
pub struct SetHealthEvent {
    pub target: Entity,
    pub new_max: f32,
}

/// Entities waiting for a timed despawn.
#[derive(Resource, Default, Debug)]
pub struct DeferredRemovals(pub RemovalQueue<Entity>);

/// Marks an entity that is switched off but may be re-armed later.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Inactive;

#[derive(Component, Clone, Debug)]
pub struct EffectInstance {
    pub template: String,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct ParticleEmitter(pub ParticlePlayback);

#[derive(Component, Clone, Debug)]
pub struct AudioEmitter(pub AudioPlayback);

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct ParticlesPlaying;

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct AudioPlaying;

/// Health of an entity. The tracker itself is built once the entity exists,
/// on the first update after spawning.
#[derive(Component, Debug)]
pub struct Damageable {
    variant: TrackerVariant,
    settings: TrackerSettings,
    tracker: Option<Destructible<Entity>>,
}

impl Damageable {
    pub fn new(variant: TrackerVariant, settings: TrackerSettings) -> Self {
        Self {
            variant,
            settings,
            tracker: None,
        }
    }

    pub fn transient(settings: TrackerSettings) -> Self {
        Self::new(TrackerVariant::Transient, settings)
    }

    pub fn pooled(settings: TrackerSettings) -> Self {
        Self::new(TrackerVariant::Pooled, settings)
    }

    fn arm<S>(&mut self, owner: Entity, services: &mut S)
    where
        S: EntityServices<Handle = Entity>,
    {
        let mut tracker = Destructible::new(owner, self.variant, self.settings.clone());
        tracker.on_create(services);
        self.tracker = Some(tracker);
    }

    pub fn tracker(&self) -> Option<&Destructible<Entity>> {
        self.tracker.as_ref()
    }

    pub fn current_health(&self) -> f32 {
        self.tracker
            .as_ref()
            .map(Destructible::current_health)
            .unwrap_or(self.settings.starting_health)
    }

    pub fn max_health(&self) -> f32 {
        self.tracker
            .as_ref()
            .map(Destructible::max_health)
            .unwrap_or(self.settings.starting_health)
    }

    pub fn is_dead(&self) -> bool {
        self.tracker.as_ref().is_some_and(Destructible::is_dead)
    }
}

/// [`EntityServices`] on top of [`Commands`]. Capabilities of effects
/// spawned through it are answered from their templates.
struct CommandServices<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    removals: &'a mut RemovalQueue<Entity>,
    positions: &'a dyn Fn(Entity) -> Option<Vec3>,
    now: Duration,
    spawned: Vec<(Entity, EffectTemplate)>,
}

impl<'a, 'w, 's> CommandServices<'a, 'w, 's> {
    fn new(
        commands: &'a mut Commands<'w, 's>,
        removals: &'a mut RemovalQueue<Entity>,
        positions: &'a dyn Fn(Entity) -> Option<Vec3>,
        now: Duration,
    ) -> Self {
        Self {
            commands,
            removals,
            positions,
            now,
            spawned: Vec::new(),
        }
    }

    fn template(&self, effect: Entity) -> Option<&EffectTemplate> {
        self.spawned
            .iter()
            .find(|(entity, _)| *entity == effect)
            .map(|(_, template)| template)
    }

    fn spawn_effect(
        &mut self,
        template: &EffectTemplate,
        transform: Transform,
        active: bool,
    ) -> Entity {
        let mut effect = self.commands.spawn((
            EffectInstance {
                template: template.name.clone(),
            },
            transform,
        ));
        if active {
            effect.insert(Visibility::Inherited);
        } else {
            effect.insert((Visibility::Hidden, Inactive));
        }
        if let Some(particles) = template.particles {
            effect.insert(ParticleEmitter(particles.into()));
            if active {
                effect.insert(ParticlesPlaying);
            }
        }
        if let Some(audio) = template.audio.clone() {
            effect.insert(AudioEmitter(audio.into()));
            if active {
                effect.insert(AudioPlaying);
            }
        }
        let id = effect.id();
        self.spawned.push((id, template.clone()));
        id
    }
}

impl EntityServices for CommandServices<'_, '_, '_> {
    type Handle = Entity;

    fn position(&self, entity: Entity) -> Vec3 {
        (self.positions)(entity).unwrap_or(Vec3::ZERO)
    }

    fn instantiate(&mut self, template: &EffectTemplate, position: Vec3, rotation: Quat) -> Entity {
        let transform = Transform::from_translation(position).with_rotation(rotation);
        self.spawn_effect(template, transform, true)
    }

    fn instantiate_inactive(&mut self, template: &EffectTemplate) -> Entity {
        self.spawn_effect(template, Transform::default(), false)
    }

    fn particles(&self, effect: Entity) -> Option<ParticlePlayback> {
        self.template(effect)
            .and_then(|template| template.particles)
            .map(ParticlePlayback::from)
    }

    fn audio(&self, effect: Entity) -> Option<AudioPlayback> {
        self.template(effect)
            .and_then(|template| template.audio.clone())
            .map(AudioPlayback::from)
    }

    fn move_to(&mut self, entity: Entity, position: Vec3) {
        if let Some(mut cmds) = self.commands.get_entity(entity) {
            cmds.queue(move |mut target: EntityWorldMut| {
                if let Some(mut transform) = target.get_mut::<Transform>() {
                    transform.translation = position;
                }
            });
        }
    }

    fn set_active(&mut self, entity: Entity, active: bool) {
        if let Some(mut cmds) = self.commands.get_entity(entity) {
            if active {
                cmds.remove::<Inactive>().insert(Visibility::Inherited);
            } else {
                cmds.insert((Inactive, Visibility::Hidden));
            }
        }
    }

    fn play_particles(&mut self, effect: Entity) {
        if let Some(mut cmds) = self.commands.get_entity(effect) {
            cmds.insert(ParticlesPlaying);
        }
    }

    fn play_audio(&mut self, effect: Entity) {
        if let Some(mut cmds) = self.commands.get_entity(effect) {
            cmds.insert(AudioPlaying);
        }
    }

    fn remove(&mut self, entity: Entity, delay: Option<Duration>) {
        match delay {
            None => {
                if let Some(cmds) = self.commands.get_entity(entity) {
                    cmds.despawn_recursive();
                }
            }
            Some(delay) => self.removals.schedule(entity, self.now + delay),
        }
    }
}

fn arm_trackers(
    mut commands: Commands,
    time: Res<Time>,
    mut removals: ResMut<DeferredRemovals>,
    transforms: TransformHelper,
    mut added: Query<(Entity, &mut Damageable), Added<Damageable>>,
) {
    if added.is_empty() {
        return;
    }
    let lookup = |entity: Entity| {
        transforms
            .compute_global_transform(entity)
            .ok()
            .map(|global| global.translation())
    };
    let mut services =
        CommandServices::new(&mut commands, &mut removals.0, &lookup, time.elapsed());
    for (entity, mut damageable) in added.iter_mut() {
        damageable.arm(entity, &mut services);
        debug!(target: "health.plugin", ?entity, variant = ?damageable.variant, "tracker armed");
    }
}

fn rearm_reactivated(
    mut reactivated: RemovedComponents<Inactive>,
    mut trackers: Query<&mut Damageable>,
) {
    for entity in reactivated.read() {
        if let Ok(mut damageable) = trackers.get_mut(entity) {
            if let Some(tracker) = damageable.tracker.as_mut() {
                tracker.on_activate();
            }
        }
    }
}

fn apply_damage_events(
    mut events: EventReader<DamageEvent>,
    mut commands: Commands,
    time: Res<Time>,
    mut removals: ResMut<DeferredRemovals>,
    transforms: TransformHelper,
    mut targets: Query<&mut Damageable>,
) {
    if events.is_empty() {
        return;
    }
    let lookup = |entity: Entity| {
        transforms
            .compute_global_transform(entity)
            .ok()
            .map(|global| global.translation())
    };
    let mut services =
        CommandServices::new(&mut commands, &mut removals.0, &lookup, time.elapsed());
    for event in events.read() {
        let Ok(mut damageable) = targets.get_mut(event.target) else {
            debug!(target: "health.plugin", entity = ?event.target, "damage for untracked entity");
            continue;
        };
        let Some(tracker) = damageable.tracker.as_mut() else {
            continue;
        };
        if tracker.take_damage(event.amount, &mut services) == DamageOutcome::Died {
            info!(target: "health.plugin", entity = ?event.target, "entity destroyed");
        }
    }
}

fn apply_set_health_events(
    mut events: EventReader<SetHealthEvent>,
    mut commands: Commands,
    time: Res<Time>,
    mut removals: ResMut<DeferredRemovals>,
    transforms: TransformHelper,
    mut targets: Query<&mut Damageable>,
) {
    if events.is_empty() {
        return;
    }
    let lookup = |entity: Entity| {
        transforms
            .compute_global_transform(entity)
            .ok()
            .map(|global| global.translation())
    };
    let mut services =
        CommandServices::new(&mut commands, &mut removals.0, &lookup, time.elapsed());
    for event in events.read() {
        if let Ok(mut damageable) = targets.get_mut(event.target) {
            if let Some(tracker) = damageable.tracker.as_mut() {
                tracker.set_health(event.new_max, &mut services);
            }
        }
    }
}

fn release_expired_effects(
    mut commands: Commands,
    time: Res<Time>,
    mut removals: ResMut<DeferredRemovals>,
) {
    for entity in removals.0.drain_due(time.elapsed()) {
        if let Some(cmds) = commands.get_entity(entity) {
            cmds.despawn_recursive();
        }
    }
}

/// Teardown of a tracked entity: hands its prewarmed effect, if any, to the
/// removal queue or despawns it right away.
fn release_prewarmed_effect(mut world: DeferredWorld, entity: Entity, _component: ComponentId) {
    let Some((effect, delay)) = world
        .get::<Damageable>(entity)
        .and_then(|damageable| damageable.tracker.as_ref())
        .and_then(Destructible::pending_release)
    else {
        return;
    };

    match delay {
        None => {
            if let Some(cmds) = world.commands().get_entity(effect) {
                cmds.despawn_recursive();
            }
        }
        Some(delay) => {
            let now = world
                .get_resource::<Time>()
                .map(Time::elapsed)
                .unwrap_or_default();
            if let Some(mut removals) = world.get_resource_mut::<DeferredRemovals>() {
                removals.0.schedule(effect, now + delay);
            }
        }
    }
}

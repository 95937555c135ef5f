//! Death effect templates and the calls a tracker makes into its host world.

use std::fmt::Debug;
use std::time::Duration;

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Lifetime given to an effect instance that cannot report its own duration
/// (a sound-only effect, for example).
pub const FALLBACK_EFFECT_LIFETIME: Duration = Duration::from_secs(5);

/// Authored description of a transient death effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    pub name: String,
    #[serde(default)]
    pub particles: Option<ParticleSettings>,
    #[serde(default)]
    pub audio: Option<AudioSettings>,
}

impl EffectTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            particles: None,
            audio: None,
        }
    }

    pub fn with_particles(mut self, duration: f32, max_lifetime: f32) -> Self {
        self.particles = Some(ParticleSettings {
            duration,
            max_lifetime,
        });
        self
    }

    pub fn with_audio(mut self, clip: impl Into<String>) -> Self {
        self.audio = Some(AudioSettings { clip: clip.into() });
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleSettings {
    /// Emission duration in seconds.
    pub duration: f32,
    /// Longest lifetime a single particle can have, in seconds.
    pub max_lifetime: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub clip: String,
}

/// Particle playback capability of an instantiated effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticlePlayback {
    pub duration: f32,
    pub max_lifetime: f32,
}

impl ParticlePlayback {
    /// Time from the start of emission until the last particle has faded.
    /// Values that do not fit a [`Duration`] fall back to
    /// [`FALLBACK_EFFECT_LIFETIME`].
    pub fn total_duration(&self) -> Duration {
        Duration::try_from_secs_f32((self.duration + self.max_lifetime).max(0.0))
            .unwrap_or(FALLBACK_EFFECT_LIFETIME)
    }
}

impl From<ParticleSettings> for ParticlePlayback {
    fn from(settings: ParticleSettings) -> Self {
        Self {
            duration: settings.duration,
            max_lifetime: settings.max_lifetime,
        }
    }
}

/// Audio playback capability of an instantiated effect.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPlayback {
    pub clip: String,
}

impl From<AudioSettings> for AudioPlayback {
    fn from(settings: AudioSettings) -> Self {
        Self { clip: settings.clip }
    }
}

/// How long an effect instance stays around after it starts playing.
pub fn effect_lifetime(particles: Option<&ParticlePlayback>) -> Duration {
    particles
        .map(ParticlePlayback::total_duration)
        .unwrap_or(FALLBACK_EFFECT_LIFETIME)
}

/// Host world seen from a health tracker: effect instantiation, capability
/// queries and entity removal.
pub trait EntityServices {
    type Handle: Copy + Eq + Debug;

    fn position(&self, entity: Self::Handle) -> Vec3;

    /// Creates an active, playing instance of `template`.
    fn instantiate(&mut self, template: &EffectTemplate, position: Vec3, rotation: Quat)
        -> Self::Handle;

    /// Creates an inactive instance of `template` to be triggered later.
    fn instantiate_inactive(&mut self, template: &EffectTemplate) -> Self::Handle;

    fn particles(&self, effect: Self::Handle) -> Option<ParticlePlayback>;

    fn audio(&self, effect: Self::Handle) -> Option<AudioPlayback>;

    fn move_to(&mut self, entity: Self::Handle, position: Vec3);

    fn set_active(&mut self, entity: Self::Handle, active: bool);

    fn play_particles(&mut self, effect: Self::Handle);

    fn play_audio(&mut self, effect: Self::Handle);

    /// Removes `entity` now, or after `delay` when one is given. A delayed
    /// removal cannot be cancelled.
    fn remove(&mut self, entity: Self::Handle, delay: Option<Duration>);
}

//! Damage, death and death effects for destructible entities.
//!
//! Two tracker strategies share one contract: [`HealthTracker`] spawns a
//! fresh effect per death and can be re-armed, [`PooledEffectHealthTracker`]
//! prewarms a single effect and is single-use. Both talk to their host world
//! only through [`EntityServices`], implemented here for Bevy
//! ([`HealthPlugin`]) and for a headless [`sim::SimWorld`].

pub mod config;
pub mod destructible;
pub mod effects;
pub mod plugin;
pub mod pooled;
pub mod record;
pub mod removal;
pub mod scenario;
pub mod sim;
pub mod tracker;

pub use config::{ConfigError, ScenarioConfig};
pub use destructible::{Destructible, TrackerVariant};
pub use effects::{EffectTemplate, EntityServices, FALLBACK_EFFECT_LIFETIME};
pub use plugin::{DamageEvent, Damageable, HealthPlugin, SetHealthEvent};
pub use pooled::PooledEffectHealthTracker;
pub use record::{DamageOutcome, HealthRecord};
pub use scenario::{run_scenario, ScenarioReport};
pub use tracker::{HealthTracker, TrackerSettings};

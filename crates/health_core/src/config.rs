use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::destructible::TrackerVariant;
use crate::effects::{AudioSettings, EffectTemplate, ParticleSettings};
use crate::record::DEFAULT_STARTING_HEALTH;
use crate::tracker::TrackerSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scenario {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("entity `{0}` is declared more than once")]
    DuplicateEntity(String),
    #[error("entity `{entity}` uses unknown effect `{effect}`")]
    UnknownEffect { entity: String, effect: String },
    #[error("step {index} targets unknown entity `{target}`")]
    UnknownEntity { index: usize, target: String },
    #[error("step {index} at {at}s is earlier than the step before it")]
    UnorderedStep { index: usize, at: f32 },
    #[error("step {index} ({action}) needs an `amount`")]
    MissingAmount { index: usize, action: StepAction },
    #[error("{field} is {value}, expected a finite, non-negative number of seconds")]
    InvalidNumber { field: String, value: f32 },
}

/// An authored scene: effect templates, tracked entities and a timed script
/// of health events.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub effects: BTreeMap<String, EffectConfig>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityConfig>,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

impl ScenarioConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::parse(&data)?;
        if cfg.name.is_none() {
            cfg.name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_owned);
        }
        Ok(cfg)
    }

    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let cfg: ScenarioConfig = toml::from_str(data)?;
        Ok(cfg)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, effect) in &self.effects {
            if let Some(particles) = effect.particles {
                check_seconds(format!("effect `{name}` particles.duration"), particles.duration)?;
                check_seconds(
                    format!("effect `{name}` particles.max_lifetime"),
                    particles.max_lifetime,
                )?;
                check_seconds(
                    format!("effect `{name}` particle lifetime"),
                    particles.duration + particles.max_lifetime,
                )?;
            }
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            if !names.insert(entity.name.as_str()) {
                return Err(ConfigError::DuplicateEntity(entity.name.clone()));
            }
            if let Some(effect) = &entity.effect {
                if !self.effects.contains_key(effect) {
                    return Err(ConfigError::UnknownEffect {
                        entity: entity.name.clone(),
                        effect: effect.clone(),
                    });
                }
            }
        }

        let mut last_at = 0.0;
        for (index, step) in self.steps.iter().enumerate() {
            if !names.contains(step.target.as_str()) {
                return Err(ConfigError::UnknownEntity {
                    index,
                    target: step.target.clone(),
                });
            }
            check_seconds(format!("step {index} `at`"), step.at)?;
            if step.at < last_at {
                return Err(ConfigError::UnorderedStep { index, at: step.at });
            }
            last_at = step.at;
            if step.action.takes_amount() && step.amount.is_none() {
                return Err(ConfigError::MissingAmount {
                    index,
                    action: step.action,
                });
            }
        }
        Ok(())
    }

    pub fn template(&self, name: &str) -> Option<EffectTemplate> {
        self.effects.get(name).map(|effect| EffectTemplate {
            name: name.to_owned(),
            particles: effect.particles,
            audio: effect.audio.clone(),
        })
    }

    /// Resolves the effect reference of `entity` into tracker settings.
    pub fn settings_for(&self, entity: &EntityConfig) -> TrackerSettings {
        TrackerSettings {
            starting_health: entity.starting_health,
            effect: entity.effect.as_deref().and_then(|name| self.template(name)),
            destroy_on_death: entity.destroy_on_death,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EffectConfig {
    #[serde(default)]
    pub particles: Option<ParticleSettings>,
    #[serde(default)]
    pub audio: Option<AudioSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub variant: TrackerVariant,
    #[serde(default = "default_starting_health")]
    pub starting_health: f32,
    #[serde(default = "default_destroy_on_death")]
    pub destroy_on_death: bool,
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
}

fn default_starting_health() -> f32 {
    DEFAULT_STARTING_HEALTH
}

fn default_destroy_on_death() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Seconds since the start of the scenario.
    pub at: f32,
    pub target: String,
    pub action: StepAction,
    #[serde(default)]
    pub amount: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Damage,
    SetHealth,
    Deactivate,
    Reactivate,
}

impl StepAction {
    pub fn takes_amount(&self) -> bool {
        matches!(self, StepAction::Damage | StepAction::SetHealth)
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepAction::Damage => "damage",
            StepAction::SetHealth => "set_health",
            StepAction::Deactivate => "deactivate",
            StepAction::Reactivate => "reactivate",
        };
        f.write_str(label)
    }
}

/// Seconds that can become a [`Duration`]: finite, non-negative and in range.
fn check_seconds(field: String, value: f32) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f32(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::InvalidNumber { field, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRATES: &str = r#"
name = "crates"

[effects.splinters]
particles = { duration = 2.0, max_lifetime = 1.5 }
audio = { clip = "wood_break.ogg" }

[[entity]]
name = "crate"
effect = "splinters"
position = [1.0, 0.0, 2.0]

[[entity]]
name = "barrel"
variant = "pooled"
starting_health = 20.0

[[step]]
at = 0.5
target = "crate"
action = "damage"
amount = 30.0

[[step]]
at = 1.0
target = "barrel"
action = "set_health"
amount = 0.0
"#;

    #[test]
    fn parses_defaults_and_references() {
        let cfg = ScenarioConfig::parse(CRATES).unwrap();
        cfg.validate().unwrap();

        let crate_cfg = &cfg.entities[0];
        assert_eq!(TrackerVariant::Transient, crate_cfg.variant);
        assert_eq!(DEFAULT_STARTING_HEALTH, crate_cfg.starting_health);
        assert!(crate_cfg.destroy_on_death);

        let settings = cfg.settings_for(crate_cfg);
        let template = settings.effect.unwrap();
        assert_eq!("splinters", template.name);
        assert_eq!(Some(2.0), template.particles.map(|p| p.duration));

        assert_eq!(TrackerVariant::Pooled, cfg.entities[1].variant);
        assert_eq!(StepAction::SetHealth, cfg.steps[1].action);
    }

    #[test]
    fn rejects_unknown_effect() {
        let cfg = ScenarioConfig::parse(
            r#"
[[entity]]
name = "crate"
effect = "missing"
"#,
        )
        .unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownEffect { effect, .. }) if effect == "missing"
        ));
    }

    #[test]
    fn rejects_out_of_order_steps() {
        let cfg = ScenarioConfig::parse(
            r#"
[[entity]]
name = "crate"

[[step]]
at = 2.0
target = "crate"
action = "deactivate"

[[step]]
at = 1.0
target = "crate"
action = "reactivate"
"#,
        )
        .unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnorderedStep { index: 1, .. })
        ));
    }

    #[test]
    fn damage_without_amount_is_rejected() {
        let cfg = ScenarioConfig::parse(
            r#"
[[entity]]
name = "crate"

[[step]]
at = 0.0
target = "crate"
action = "damage"
"#,
        )
        .unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!("step 0 (damage) needs an `amount`", err.to_string());
    }

    #[test]
    fn duplicate_entities_are_rejected() {
        let cfg = ScenarioConfig::parse(
            r#"
[[entity]]
name = "crate"

[[entity]]
name = "crate"
"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateEntity(_))));
    }

    #[test]
    fn infinite_particle_duration_is_rejected() {
        let cfg = ScenarioConfig::parse(
            r#"
[effects.boom]
particles = { duration = inf, max_lifetime = 1.0 }

[[entity]]
name = "barrel"
effect = "boom"
"#,
        )
        .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidNumber { field, .. } if field == "effect `boom` particles.duration"
        ));
    }

    #[test]
    fn out_of_range_step_time_is_rejected() {
        let cfg = ScenarioConfig::parse(
            r#"
[[entity]]
name = "crate"

[[step]]
at = 1e30
target = "crate"
action = "deactivate"
"#,
        )
        .unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidNumber { field, .. }) if field == "step 0 `at`"
        ));
    }

    #[test]
    fn negative_particle_lifetime_is_rejected() {
        let cfg = ScenarioConfig::parse(
            r#"
[effects.sparks]
particles = { duration = 0.5, max_lifetime = -1.0 }
"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidNumber { .. })));
    }
}

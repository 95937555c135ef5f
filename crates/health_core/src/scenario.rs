//! Replays an authored [`ScenarioConfig`] against a [`Scene`].

use std::collections::BTreeMap;
use std::time::Duration;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigError, ScenarioConfig, StepAction};
use crate::destructible::TrackerVariant;
use crate::record::DamageOutcome;
use crate::sim::{Scene, SimHandle, TraceEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub duration_ms: u64,
    pub entities: Vec<EntitySummary>,
    pub trace: Vec<TraceEvent>,
}

impl ScenarioReport {
    pub fn deaths(&self) -> usize {
        self.trace
            .iter()
            .filter(|event| matches!(event, TraceEvent::Died { .. }))
            .count()
    }
}

/// Final state of one tracked entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitySummary {
    pub name: String,
    pub handle: SimHandle,
    pub variant: TrackerVariant,
    pub current_health: f32,
    pub max_health: f32,
    pub dead: bool,
    pub removed: bool,
}

pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioReport, ConfigError> {
    config.validate()?;

    let mut scene = Scene::new();
    let mut handles = BTreeMap::new();
    for entity in &config.entities {
        let handle = scene.spawn(
            entity.name.clone(),
            Vec3::from_array(entity.position),
            entity.variant,
            config.settings_for(entity),
        );
        handles.insert(entity.name.as_str(), handle);
    }

    for step in &config.steps {
        let Some(&target) = handles.get(step.target.as_str()) else {
            continue;
        };
        let at = Duration::try_from_secs_f32(step.at).unwrap_or_default();
        scene.advance(at.saturating_sub(scene.world().now()));

        let amount = step.amount.unwrap_or_default();
        match step.action {
            StepAction::Damage => {
                if scene.damage(target, amount) == Some(DamageOutcome::AlreadyDead) {
                    info!(
                        target: "health.scenario",
                        entity = %step.target,
                        amount,
                        "damage ignored, already dead"
                    );
                }
            }
            StepAction::SetHealth => {
                scene.set_health(target, amount);
            }
            StepAction::Deactivate => {
                if !scene.deactivate(target) {
                    warn!(target: "health.scenario", entity = %step.target, "deactivate skipped");
                }
            }
            StepAction::Reactivate => {
                if !scene.reactivate(target) {
                    warn!(target: "health.scenario", entity = %step.target, "reactivate skipped");
                }
            }
        }
    }

    scene.settle();

    let entities = config
        .entities
        .iter()
        .filter_map(|entity| {
            let handle = *handles.get(entity.name.as_str())?;
            let tracker = scene.tracker(handle)?;
            Some(EntitySummary {
                name: entity.name.clone(),
                handle,
                variant: tracker.variant(),
                current_health: tracker.current_health(),
                max_health: tracker.max_health(),
                dead: tracker.is_dead(),
                removed: !scene.world().contains(handle),
            })
        })
        .collect();

    let report = ScenarioReport {
        scenario: config.display_name().to_owned(),
        duration_ms: scene.world().now().as_millis() as u64,
        entities,
        trace: scene.world().trace().to_vec(),
    };
    info!(
        target: "health.scenario",
        scenario = %report.scenario,
        deaths = report.deaths(),
        duration_ms = report.duration_ms,
        "scenario finished"
    );
    Ok(report)
}

//! Helpers for deterministic regression tests.

use std::path::PathBuf;

use health_core::sim::TraceEvent;
use health_core::{run_scenario, ScenarioConfig, ScenarioReport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;

/// Whole-number hits so running totals stay exact in `f32`.
pub fn damage_sequence(seed: u64, len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(1..=12) as f32).collect()
}

/// Root of the authored scenario files shipped with the workspace.
pub fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

pub fn run_shipped_scenario(file: &str) -> ScenarioReport {
    let config = ScenarioConfig::from_path(&scenario_dir().join(file))
        .unwrap_or_else(|err| panic!("{file}: {err}"));
    run_scenario(&config).unwrap_or_else(|err| panic!("{file}: {err}"))
}

/// One line per event. Floats are printed with a fixed precision so the
/// output is stable across platforms.
pub fn render_trace(trace: &[TraceEvent]) -> String {
    trace
        .iter()
        .map(render_event)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_event(event: &TraceEvent) -> String {
    let (at_ms, text) = match event {
        TraceEvent::Spawned {
            at_ms,
            entity,
            label,
            position,
        } => (*at_ms, format!("spawned #{} {label} at {}", entity.0, point(position))),
        TraceEvent::Damaged {
            at_ms,
            entity,
            amount,
            current,
        } => (*at_ms, format!("damaged #{} by {amount:.1} -> {current:.1}", entity.0)),
        TraceEvent::Rescaled {
            at_ms,
            entity,
            max,
            current,
        } => (*at_ms, format!("rescaled #{} to {max:.1} -> {current:.1}", entity.0)),
        TraceEvent::Died { at_ms, entity } => (*at_ms, format!("died #{}", entity.0)),
        TraceEvent::EffectSpawned {
            at_ms,
            effect,
            template,
            position,
            active,
        } => (
            *at_ms,
            format!(
                "effect #{} {template} at {} active={active}",
                effect.0,
                point(position)
            ),
        ),
        TraceEvent::Moved {
            at_ms,
            entity,
            position,
        } => (*at_ms, format!("moved #{} to {}", entity.0, point(position))),
        TraceEvent::Activated { at_ms, entity } => (*at_ms, format!("activated #{}", entity.0)),
        TraceEvent::Deactivated { at_ms, entity } => {
            (*at_ms, format!("deactivated #{}", entity.0))
        }
        TraceEvent::ParticlesStarted { at_ms, effect } => {
            (*at_ms, format!("particles #{}", effect.0))
        }
        TraceEvent::AudioStarted {
            at_ms,
            effect,
            clip,
        } => (*at_ms, format!("audio #{} {clip}", effect.0)),
        TraceEvent::RemovalScheduled {
            at_ms,
            entity,
            fire_at_ms,
        } => (*at_ms, format!("remove #{} at {fire_at_ms}ms", entity.0)),
        TraceEvent::Removed { at_ms, entity } => (*at_ms, format!("removed #{}", entity.0)),
    };
    format!("{at_ms}ms {text}")
}

fn point(position: &[f32; 3]) -> String {
    format!("({:.1}, {:.1}, {:.1})", position[0], position[1], position[2])
}

use health_core::ScenarioReport;
use health_regression::{render_trace, run_shipped_scenario};
use serde::Serialize;

#[derive(Serialize)]
struct Outcome {
    scenario: String,
    duration_ms: u64,
    deaths: usize,
    removed: Vec<String>,
    alive: Vec<String>,
}

fn outcome(report: &ScenarioReport) -> Outcome {
    let names = |removed: bool| {
        report
            .entities
            .iter()
            .filter(|entity| entity.removed == removed)
            .map(|entity| entity.name.clone())
            .collect()
    };
    Outcome {
        scenario: report.scenario.clone(),
        duration_ms: report.duration_ms,
        deaths: report.deaths(),
        removed: names(true),
        alive: names(false),
    }
}

#[test]
fn crate_break_trace() {
    let report = run_shipped_scenario("crate_break.toml");
    insta::assert_snapshot!("crate_break_trace", render_trace(&report.trace));
}

#[test]
fn barrel_chain_trace() {
    let report = run_shipped_scenario("barrel_chain.toml");
    insta::assert_snapshot!("barrel_chain_trace", render_trace(&report.trace));
}

#[test]
fn barrel_chain_outcome() {
    let report = run_shipped_scenario("barrel_chain.toml");
    insta::assert_json_snapshot!("barrel_chain_outcome", outcome(&report));
}

#[test]
fn difficulty_rescale_trace() {
    let report = run_shipped_scenario("difficulty_rescale.toml");
    let wall = &report.entities[0];
    assert_eq!(20.0, wall.current_health);
    assert_eq!(30.0, wall.max_health);
    insta::assert_snapshot!("difficulty_rescale_trace", render_trace(&report.trace));
}

use chrono::Utc;
use health_core::ScenarioReport;
use serde::{Deserialize, Serialize};

/// A scenario report stamped with the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub timestamp: String,
    pub source: String,
    pub report: ScenarioReport,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, source: impl Into<String>, report: ScenarioReport) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339(),
            source: source.into(),
            report,
        }
    }

    /// One line per tracked entity.
    pub fn summary_lines(&self) -> Vec<String> {
        self.report
            .entities
            .iter()
            .map(|entity| {
                let state = match (entity.dead, entity.removed) {
                    (false, _) => "alive",
                    (true, true) => "removed",
                    (true, false) => "inactive",
                };
                format!(
                    "{:<16} {:?} {:>8.2}/{:<8.2} {state}",
                    entity.name, entity.variant, entity.current_health, entity.max_health
                )
            })
            .collect()
    }
}

/// Outcome of validating one scenario file.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub path: String,
    pub passed: bool,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use health_core::scenario::EntitySummary;
    use health_core::sim::SimHandle;
    use health_core::TrackerVariant;

    use super::*;

    #[test]
    fn summary_marks_removed_entities() {
        let report = ScenarioReport {
            scenario: "crates".into(),
            duration_ms: 0,
            entities: vec![EntitySummary {
                name: "crate".into(),
                handle: SimHandle(0),
                variant: TrackerVariant::Transient,
                current_health: -5.0,
                max_health: 50.0,
                dead: true,
                removed: true,
            }],
            trace: Vec::new(),
        };
        let record = RunRecord::new("run-1", "crates.toml", report);
        let lines = record.summary_lines();
        assert_eq!(1, lines.len());
        assert!(lines[0].starts_with("crate"));
        assert!(lines[0].ends_with("removed"));
    }
}

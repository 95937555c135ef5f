mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use health_core::{run_scenario, ScenarioConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::report::{CheckResult, RunRecord};

#[derive(Parser)]
#[command(version, about = "Replay and validate destructible-entity health scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and emit a JSON report.
    Run(RunArgs),
    /// Validate every scenario file under a directory.
    Check(CheckArgs),
    /// Summarise a saved report.
    Report(ReportArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    scenario: PathBuf,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long, default_value = "scenarios")]
    dir: PathBuf,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Check(args) => handle_check(args),
        Commands::Report(args) => handle_report(args),
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config = ScenarioConfig::from_path(&args.scenario)?;
    let report = run_scenario(&config)
        .with_context(|| format!("scenario {} is invalid", args.scenario.display()))?;

    let run_id = args
        .id
        .unwrap_or_else(|| format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S")));
    let record = RunRecord::new(run_id, args.scenario.display().to_string(), report);
    let json = serde_json::to_string_pretty(&record)?;
    println!("{json}");

    if let Some(out) = args.out.as_ref() {
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(out, &json).with_context(|| format!("failed to write {}", out.display()))?;
        info!(target: "health.cli", path = %out.display(), "report written");
    }
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<()> {
    let mut results = Vec::new();
    for entry in WalkDir::new(&args.dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            results.push(check_scenario(path));
        }
    }

    let failed = results.iter().filter(|result| !result.passed).count();
    println!("{}", serde_json::to_string_pretty(&results)?);
    if failed > 0 {
        anyhow::bail!("{failed} of {} scenarios failed validation", results.len());
    }
    info!(target: "health.cli", checked = results.len(), "all scenarios valid");
    Ok(())
}

fn check_scenario(path: &Path) -> CheckResult {
    let outcome = ScenarioConfig::from_path(path).and_then(|config| config.validate());
    let (passed, details) = match outcome {
        Ok(()) => (true, "ok".to_string()),
        Err(err) => {
            warn!(target: "health.cli", path = %path.display(), error = %err, "invalid scenario");
            (false, err.to_string())
        }
    };
    CheckResult {
        path: path.display().to_string(),
        passed,
        details,
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.len() > 1)
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let data = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let record: RunRecord = serde_json::from_str(&data)?;
    println!(
        "Report {} for {} ({} deaths, {} ms)",
        record.id,
        record.report.scenario,
        record.report.deaths(),
        record.report.duration_ms
    );
    for line in record.summary_lines() {
        println!("  {line}");
    }
    Ok(())
}

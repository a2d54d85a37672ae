mod scenario;
mod scripted;

use scenario::Report;
use scenario::Scenario;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wp_core::WaypointError;
use wp_core::WaypointResult;

const USAGE: &str = "usage: waypoint-shell <scenario.json>";

fn main() -> ExitCode {
    init_tracing();

    let path = match scenario_path_from_args() {
        Ok(path) => path,
        Err(error) => {
            eprintln!("{error}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match load(&path).and_then(scenario::run) {
        Ok(report) => match print_report(&report) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("waypoint-shell: {error}");
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            eprintln!("waypoint-shell: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WAYPOINT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn scenario_path_from_args() -> Result<String, String> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        return Err("missing scenario path".to_owned());
    };
    if path.starts_with("--") {
        return Err(format!("unknown option `{path}`"));
    }
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument `{extra}`"));
    }
    Ok(path)
}

fn load(path: &str) -> WaypointResult<Scenario> {
    let input = std::fs::read_to_string(path).map_err(|error| {
        WaypointError::new(
            "shell.scenario_unreadable",
            format!("failed to read {path}: {error}"),
        )
    })?;
    let mut scenario = Scenario::from_json(&input)?;
    scenario.config = scenario.config.with_env_overrides()?;
    tracing::info!(path, steps = scenario.steps.len(), "scenario loaded");
    Ok(scenario)
}

fn print_report(report: &Report) -> WaypointResult<()> {
    let page = serde_json::to_string_pretty(&report.page).map_err(|error| {
        WaypointError::new("shell.report_failed", format!("failed to encode page: {error}"))
    })?;
    println!("{page}");
    println!("requests: {}", report.requests);
    for event in &report.events {
        println!("event: {event}");
    }
    Ok(())
}

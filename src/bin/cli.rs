//! Thin command-line driver: read a JSON config file, run the scheduler
//! once, print the resulting roster (and a short summary) as JSON on
//! stdout. Mirrors the teacher's own `bin/cli.rs` in spirit — a small
//! binary that does I/O and nothing else, with all real logic living in
//! the library crate.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::process::ExitCode;

use serde::Serialize;
use shift_roster::config::{build_config, RawConfig};
use shift_roster::scheduler::Scheduler;

#[derive(Serialize)]
struct CliOutput {
    coverage: f64,
    balance_score: f64,
    violation_count: usize,
    schedule: HashMap<String, Vec<Option<String>>>,
    worker_totals: HashMap<String, (u32, u32)>,
}

fn run() -> Result<CliOutput, String> {
    let path = env::args().nth(1).ok_or_else(|| "usage: roster-cli <config.json>".to_string())?;
    let raw_text = fs::read_to_string(&path).map_err(|e| format!("reading {path}: {e}"))?;
    let raw: RawConfig = serde_json::from_str(&raw_text).map_err(|e| format!("parsing {path}: {e}"))?;
    let config = build_config(raw).map_err(|e| format!("invalid config: {e}"))?;

    let scheduler = Scheduler::new(&config);
    let result = scheduler.run().map_err(|e| format!("scheduling failed: {e}"))?;

    let mut schedule = HashMap::new();
    for &date in result.data.schedule.dates() {
        let slots = result.data.schedule.slots(date).unwrap_or(&[]);
        schedule.insert(date.to_string(), slots.to_vec());
    }

    let worker_totals = result
        .worker_reports
        .iter()
        .map(|(id, report)| (id.clone(), (report.actual, report.target)))
        .collect();

    Ok(CliOutput {
        coverage: result.statistics.coverage,
        balance_score: result.statistics.balance_score,
        violation_count: result.statistics.violation_count,
        schedule,
        worker_totals,
    })
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: failed to serialize output: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::FAILURE
        }
    }
}

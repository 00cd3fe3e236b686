//! CLI entry point: run every scenario and write a report.
//!
//! Usage: `run_scenarios [--format csv|json] [--out PATH]`

use dispatch_experiments::{export_to_csv, export_to_json, failure_count, run_all_scenarios};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut format = "json".to_string();
    let mut out = "scenario_report.json".to_string();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--format" => format = args.next().unwrap_or(format),
            "--out" => out = args.next().unwrap_or(out),
            other => eprintln!("ignoring unrecognized argument: {other}"),
        }
    }

    let results = run_all_scenarios(None);
    let failures = failure_count(&results);

    match format.as_str() {
        "csv" => export_to_csv(&results, &out).expect("failed to write CSV report"),
        _ => export_to_json(&results, &out).expect("failed to write JSON report"),
    }

    tracing::info!(total = results.len(), failures, out = %out, "scenario run complete");
    if failures > 0 {
        std::process::exit(1);
    }
}

//! Scenario harness for the ride dispatch engine.
//!
//! Runs the concrete end-to-end scenarios from `spec.md` §8 (plus two
//! search-radius boundary variants) concurrently via `rayon`, the same
//! fan-out shape the teacher's parameter-sweep crate used for scenario
//! parameter grids, and exports pass/fail + timing reports as CSV/JSON.
//!
//! # Quick start
//!
//! ```no_run
//! use dispatch_experiments::{run_all_scenarios, export_to_json};
//!
//! let results = run_all_scenarios(None);
//! export_to_json(&results, "scenario_report.json").unwrap();
//! ```

pub mod export;
pub mod runner;
pub mod scenarios;

pub use export::{export_to_csv, export_to_json, failure_count};
pub use runner::{run_all_scenarios, run_scenarios_with_progress};
pub use scenarios::{ScenarioId, ScenarioOutcome};

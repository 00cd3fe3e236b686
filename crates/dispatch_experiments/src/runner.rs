//! Parallel scenario execution using rayon.
//!
//! Mirrors the teacher's `run_parallel_experiments` shape: fan a list of
//! independent units of work out across a rayon thread pool and collect
//! results in input order, with an optional progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::scenarios::{run_scenario, ScenarioId, ScenarioOutcome};

/// Runs every scenario in `ScenarioId::all()` in parallel.
pub fn run_all_scenarios(num_threads: Option<usize>) -> Vec<ScenarioOutcome> {
    run_scenarios_with_progress(ScenarioId::all(), num_threads, true)
}

/// Runs the given scenarios in parallel, with an optional progress bar.
pub fn run_scenarios_with_progress(
    scenarios: Vec<ScenarioId>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Vec<ScenarioOutcome> {
    let total = scenarios.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(bar)
    } else {
        None
    };

    let pool = if let Some(threads) = num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to create scenario thread pool")
    } else {
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("failed to create scenario thread pool")
    };

    let pb_clone = pb.clone();
    let results = pool.install(|| {
        scenarios
            .par_iter()
            .map(|&id| {
                let outcome = run_scenario(id);
                if let Some(ref progress_bar) = pb_clone {
                    progress_bar.inc(1);
                }
                outcome
            })
            .collect()
    });

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("scenarios complete");
    }

    results
}

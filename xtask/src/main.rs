use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the ride dispatch engine workspace"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Formatting, clippy, and tests across the workspace
    Check,
    /// Run Criterion benchmarks for dispatch_core
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
}

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn git(args: &[&str]) -> ExitStatus {
    eprintln!("+ git {}", args.join(" "));
    Command::new("git")
        .args(args)
        .status()
        .expect("failed to execute git")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = git(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test dispatch_core");
    run_cargo(&["test", "-p", "dispatch_core"]);

    step("Test dispatch_experiments");
    run_cargo(&["test", "-p", "dispatch_experiments"]);

    eprintln!("\nCheck job passed.");
}

fn bench() {
    step("Run benchmarks");
    run_cargo(&["bench", "--package", "dispatch_core", "--bench", "performance"]);
}

fn bench_compare() {
    let baseline_dir = Path::new("target/criterion");
    if baseline_dir.exists() {
        step("Removing existing benchmark data");
        std::fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
    }

    step("Stashing current changes");
    run_git(&[
        "stash",
        "push",
        "-m",
        "Temporary stash for benchmark comparison",
    ]);

    step("Running benchmark to create baseline");
    run_cargo(&[
        "bench",
        "--package",
        "dispatch_core",
        "--bench",
        "performance",
        "--",
        "--save-baseline",
        "main",
    ]);

    step("Reapplying changes");
    run_git(&["stash", "pop"]);

    step("Running benchmark comparing against baseline");
    run_cargo(&[
        "bench",
        "--package",
        "dispatch_core",
        "--bench",
        "performance",
        "--",
        "--baseline",
        "main",
    ]);

    eprintln!("\nDone! Check the output above to see performance comparison.");
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => check(),
        Commands::Bench => bench(),
        Commands::BenchCompare => bench_compare(),
    }
}

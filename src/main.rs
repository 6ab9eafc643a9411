//! finplan CLI
//!
//! Loads a plan JSON file, validates it, runs the configured projection,
//! and writes the full result tree as JSON. Exit codes: 0 on success,
//! 1 on validation failure, 2 on load or runtime errors.

use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use clap::Parser;

use finplan::plan::{load_plan, validate_plan, SimMode};
use finplan::simulation::{RunOptions, SimulationRunner};

#[derive(Debug, Parser)]
#[command(name = "finplan", about = "Household financial plan projection engine")]
struct Args {
    /// Path to the plan JSON file
    plan: String,

    /// Output path for the result JSON
    #[arg(short, long, default_value = "result.json")]
    output: String,

    /// Override the plan's simulation mode
    #[arg(long, value_enum)]
    mode: Option<SimMode>,

    /// Override the Monte Carlo run count
    #[arg(long)]
    runs: Option<u32>,

    /// Random seed for reproducible ensembles
    #[arg(long)]
    seed: Option<u64>,

    /// Validate the plan and exit
    #[arg(long)]
    validate: bool,

    /// Print a text summary to stdout
    #[arg(long)]
    summary: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let plan = match load_plan(&args.plan) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("Failed to load plan: {err}");
            return ExitCode::from(2);
        }
    };

    let validation = validate_plan(&plan);
    for warning in &validation.warnings {
        println!("WARNING: {warning}");
    }
    for error in &validation.errors {
        eprintln!("ERROR: {error}");
    }
    if !validation.is_valid() {
        return ExitCode::from(1);
    }
    if args.validate {
        println!("Plan is valid.");
        return ExitCode::SUCCESS;
    }

    let runner = match SimulationRunner::new(plan) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let options = RunOptions { mode: args.mode, runs: args.runs, seed: args.seed };
    let result = match runner.run(&options) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Simulation failed: {err}");
            return ExitCode::from(2);
        }
    };

    let file = match File::create(&args.output) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to create {}: {err}", args.output);
            return ExitCode::from(2);
        }
    };
    if let Err(err) = serde_json::to_writer_pretty(BufWriter::new(file), &result) {
        eprintln!("Failed to write {}: {err}", args.output);
        return ExitCode::from(2);
    }

    if args.summary {
        print_summary(&result);
    }
    println!("Wrote results to {}", args.output);
    if let Some(seed) = result.seed {
        println!("Seed: {seed}");
    }
    ExitCode::SUCCESS
}

fn print_summary(result: &finplan::SimulationResult) {
    println!("Mode: {:?}", result.mode);
    match result.mode {
        SimMode::Deterministic => {
            if let (Some(first), Some(last)) = (result.annual.first(), result.annual.last()) {
                println!("Years: {}-{}", first.year, last.year);
                println!("Ending net worth: ${:.0}", last.net_worth_end);
            }
            println!("Insolvency years: {}", result.insolvency_years.len());
        }
        _ => {
            if let Some(rate) = result.success_rate {
                println!("Success rate: {:.1}% ({} runs)", rate * 100.0, result.runs.len());
            }
            if let Some(bands) = &result.bands {
                if let (Some(year), Some(median)) =
                    (bands.years.last(), bands.net_worth.p50.last())
                {
                    println!("Median net worth in {year}: ${median:.0}");
                }
            }
        }
    }
}

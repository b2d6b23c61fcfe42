use std::path::PathBuf;

use clap::Parser;

use resistance_bench::config::{BenchmarkConfig, ResolvedOutputs};
use resistance_bench::logging::init_logging;
use resistance_bench::runner::AnalysisRunner;

/// Win-chance analysis harness for the seven-seat mission game.
#[derive(Debug, Parser)]
#[command(
    name = "resistance-bench",
    author,
    version,
    about = "Exact and simulated resistance win chances"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/resistance.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the RNG seed for simulated games.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of simulated games per role assignment.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Exit after validating the configuration (no analysis is run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    match config.simulation.as_mut() {
        Some(simulation) => {
            if let Some(seed) = cli.seed {
                simulation.seed = Some(seed);
            }
            if let Some(games) = cli.games {
                simulation.games_per_hypothesis = games;
            }
        }
        None if cli.seed.is_some() || cli.games.is_some() => {
            println!("No simulation section configured: --seed/--games ignored.");
        }
        None => {}
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let model_count = config.models.len();
    let run_id = config.run_id.clone();

    println!(
        "Loaded configuration '{run_id}' with {model_count} model{} (planning with '{}')",
        if model_count == 1 { "" } else { "s" },
        config.evaluation.belief_model
    );

    let _logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = AnalysisRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: analysis skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Analysis complete for '{run_id}': opening win chance {:.6} → {} rows at {}",
        summary.win_chance,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    if let Some(real) = summary.real_win_chance {
        println!("  Under the real model: {real:.6}");
    }
    if summary.sweep_points > 0 {
        println!("  Sweep points: {}", summary.sweep_points);
    }
    if summary.simulated_games > 0 {
        println!("  Simulated games: {}", summary.simulated_games);
    }
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Sweep plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }

    Ok(())
}

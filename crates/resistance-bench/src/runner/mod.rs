mod montecarlo;
mod sweep;

pub use montecarlo::run_simulation;
pub use sweep::run_sweep;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use resistance_core::belief::CacheStats;
use resistance_core::belief::telemetry::BeliefMetrics;
use resistance_core::{
    BehaviorModel, BeliefState, DualSolver, GameConfig, MissionCtx, MissionOutcome,
    ResultSequence, SolveError, Solver, Team, TeamEvaluation,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsError, SimulationSummary};
use crate::config::{BenchmarkConfig, ResolvedOutputs, ValidationError};
use crate::report::{DualReport, EvaluationReport, PosteriorReport, SummaryReport};

/// Primary entry point: evaluates the configured models and writes artifacts.
pub struct AnalysisRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    game: GameConfig,
    models: BTreeMap<String, BehaviorModel>,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub win_chance: f64,
    pub real_win_chance: Option<f64>,
    pub sweep_points: usize,
    pub simulated_games: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
}

impl AnalysisRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let game = config.game.build()?;
        let models = config.build_models(&game)?;

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            game,
            models,
        })
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    fn model(&self, name: &str) -> Result<&BehaviorModel, RunnerError> {
        self.models
            .get(name)
            .ok_or_else(|| RunnerError::UnknownModel(name.to_string()))
    }

    /// Execute every configured analysis, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rows_written = 0usize;
        let run_id = self.config.run_id.as_str();

        let evaluation = self.evaluate()?;
        rows_written += write_row(
            &mut writer,
            &LogRow::Evaluation {
                run_id,
                model: &evaluation.model,
                win_chance: evaluation.win_chance,
                best_team: evaluation.best.map(|best| best.team),
                teams: &evaluation.teams,
                cache: evaluation.cache,
            },
        )?;
        for posterior in &evaluation.posteriors {
            rows_written += write_row(
                &mut writer,
                &LogRow::Posterior {
                    run_id,
                    model: &evaluation.model,
                    team: posterior.team,
                    outcome: posterior.outcome,
                    metrics: &posterior.metrics,
                },
            )?;
        }

        let dual = self.evaluate_dual(evaluation.win_chance)?;
        if let Some(dual) = dual.as_ref() {
            rows_written += write_row(
                &mut writer,
                &LogRow::Dual {
                    run_id,
                    belief_model: &dual.belief_model,
                    real_model: &dual.real_model,
                    belief_win_chance: dual.belief_win_chance,
                    real_win_chance: dual.real_win_chance,
                },
            )?;
        }

        let sweep = match self.config.sweep.as_ref() {
            Some(grid) => Some(run_sweep(&self.game, grid)?),
            None => None,
        };
        if let Some(sweep) = sweep.as_ref() {
            for point in &sweep.points {
                rows_written += write_row(
                    &mut writer,
                    &LogRow::SweepPoint {
                        run_id,
                        fail_probability: point.fail_probability,
                        win_chance: point.win_chance,
                    },
                )?;
            }
        }

        let simulation = match self.config.simulation.as_ref() {
            Some(settings) => {
                let model = self.model(&settings.model)?;
                Some((
                    settings.model.as_str(),
                    run_simulation(&self.game, model, settings)?,
                ))
            }
            None => None,
        };
        if let Some((model, summary)) = simulation.as_ref() {
            rows_written += write_simulation_rows(&mut writer, run_id, model, summary)?;
        }

        writer.flush()?;

        let report = SummaryReport {
            run_id,
            players: self.game.player_count(),
            spies: self.game.spy_count(),
            evaluation: &evaluation,
            dual: dual.as_ref(),
            sweep: sweep.as_ref(),
            simulation: simulation.as_ref().map(|(model, summary)| (*model, summary)),
        };
        report.write_markdown(&self.outputs.summary_md)?;

        let plot_path = match sweep.as_ref() {
            Some(sweep) if !sweep.points.is_empty() => {
                match sweep.render_plot(&self.outputs.plots_dir) {
                    Ok(path) => Some(path),
                    Err(err) => {
                        eprintln!("WARN: {}", err);
                        None
                    }
                }
            }
            _ => None,
        };

        let telemetry_path = if self.logging_enabled {
            Some(
                self.outputs
                    .summary_md
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("telemetry.jsonl"),
            )
        } else {
            None
        };

        Ok(RunSummary {
            win_chance: evaluation.win_chance,
            real_win_chance: dual.as_ref().map(|d| d.real_win_chance),
            sweep_points: sweep.as_ref().map_or(0, |s| s.points.len()),
            simulated_games: simulation.as_ref().map_or(0, |(_, s)| s.games),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            telemetry_path,
        })
    }

    /// Opening position under the belief model: value, team ranking and the
    /// posterior after each outcome of the recommended team.
    fn evaluate(&self) -> Result<EvaluationReport, RunnerError> {
        let name = &self.config.evaluation.belief_model;
        let model = self.model(name)?;
        let results = ResultSequence::new();
        let belief = BeliefState::uniform(self.game.hypothesis_space());

        let mut solver = Solver::new(&self.game, model);
        let win_chance = solver.win_chance(1, &results, &belief)?;
        let teams = solver.rank_teams(1, &results, &belief)?;
        let best = solver.best_team(1, &results, &belief)?;

        let mut posteriors = Vec::new();
        if let Some(best) = best {
            let ctx = MissionCtx::new(&self.game, 1, best.team, &results);
            for outcome in MissionOutcome::BOTH {
                let posterior = belief
                    .update_on_outcome(&ctx, model, outcome)
                    .map_err(SolveError::from)?;
                posteriors.push(PosteriorReport::capture(best.team, outcome, &posterior));
            }
        }

        event!(
            target: "resistance_bench::runner",
            Level::INFO,
            model = %name,
            win_chance,
            best_team = ?best.map(|b| b.team.to_string()),
            "opening evaluated"
        );

        Ok(EvaluationReport {
            model: name.clone(),
            win_chance,
            teams,
            best,
            cache: solver.cache_stats(),
            posteriors,
        })
    }

    fn evaluate_dual(&self, belief_win_chance: f64) -> Result<Option<DualReport>, RunnerError> {
        let belief_name = &self.config.evaluation.belief_model;
        let Some(real_name) = self.config.evaluation.real_model.as_ref() else {
            return Ok(None);
        };
        if real_name == belief_name {
            return Ok(None);
        }

        let belief_model = self.model(belief_name)?;
        let real_model = self.model(real_name)?;
        let results = ResultSequence::new();
        let belief = BeliefState::uniform(self.game.hypothesis_space());

        let mut solver = DualSolver::new(&self.game, belief_model, real_model);
        let real_win_chance = solver.win_chance_real(1, &results, &belief, &belief)?;

        event!(
            target: "resistance_bench::runner",
            Level::INFO,
            belief_model = %belief_name,
            real_model = %real_name,
            belief_win_chance,
            real_win_chance,
            "model mismatch evaluated"
        );

        Ok(Some(DualReport {
            belief_model: belief_name.clone(),
            real_model: real_name.clone(),
            belief_win_chance,
            real_win_chance,
        }))
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_row(writer: &mut BufWriter<File>, row: &LogRow<'_>) -> Result<usize, RunnerError> {
    serde_json::to_writer(&mut *writer, row)?;
    writer.write_all(b"\n")?;
    Ok(1)
}

fn write_simulation_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    model: &str,
    summary: &SimulationSummary,
) -> Result<usize, RunnerError> {
    let mut rows_written = 0usize;
    for hypothesis in &summary.hypotheses {
        rows_written += write_row(
            writer,
            &LogRow::Simulation {
                run_id,
                model,
                roles: &hypothesis.roles,
                games: hypothesis.games,
                resistance_wins: hypothesis.resistance_wins,
                win_rate: hypothesis.win_rate,
                ci95: hypothesis.ci95,
            },
        )?;
    }
    rows_written += write_row(
        writer,
        &LogRow::SimulationSummary {
            run_id,
            model,
            games: summary.games,
            resistance_wins: summary.resistance_wins,
            win_rate: summary.win_rate,
            ci95: summary.ci95,
            exact: summary.exact,
            z_score: summary.z_score,
            p_value: summary.p_value,
        },
    )?;
    Ok(rows_written)
}

/// One JSONL record; `kind` names the computed quantity.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRow<'a> {
    Evaluation {
        run_id: &'a str,
        model: &'a str,
        win_chance: f64,
        best_team: Option<Team>,
        teams: &'a [TeamEvaluation],
        cache: Option<CacheStats>,
    },
    Posterior {
        run_id: &'a str,
        model: &'a str,
        team: Team,
        outcome: MissionOutcome,
        metrics: &'a BeliefMetrics,
    },
    Dual {
        run_id: &'a str,
        belief_model: &'a str,
        real_model: &'a str,
        belief_win_chance: f64,
        real_win_chance: f64,
    },
    SweepPoint {
        run_id: &'a str,
        fail_probability: f64,
        win_chance: f64,
    },
    Simulation {
        run_id: &'a str,
        model: &'a str,
        roles: &'a str,
        games: usize,
        resistance_wins: usize,
        win_rate: f64,
        ci95: (f64, f64),
    },
    SimulationSummary {
        run_id: &'a str,
        model: &'a str,
        games: usize,
        resistance_wins: usize,
        win_rate: f64,
        ci95: (f64, f64),
        exact: f64,
        z_score: Option<f64>,
        p_value: f64,
    },
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Config(#[from] ValidationError),
    #[error("model '{0}' is not defined")]
    UnknownModel(String),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("solver failed: {0}")]
    Solve(#[from] SolveError),
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

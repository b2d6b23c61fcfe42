//! Markdown summary assembled from the runner's results.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use resistance_core::belief::CacheStats;
use resistance_core::belief::snapshot::{BeliefSnapshot, SnapshotEntry};
use resistance_core::belief::telemetry::BeliefMetrics;
use resistance_core::{BeliefState, MissionOutcome, Team, TeamEvaluation};
use serde::Serialize;

use crate::analytics::{AnalyticsError, SimulationSummary, SweepSummary};

const POSTERIOR_LINES: usize = 5;

/// Posterior after the recommended opening team returns `outcome`.
#[derive(Debug, Clone, Serialize)]
pub struct PosteriorReport {
    pub team: Team,
    pub outcome: MissionOutcome,
    pub metrics: BeliefMetrics,
    /// Most likely hypotheses, highest mass first.
    pub leading: Vec<SnapshotEntry>,
}

impl PosteriorReport {
    pub fn capture(team: Team, outcome: MissionOutcome, belief: &BeliefState) -> Self {
        let snapshot = BeliefSnapshot::capture(belief);
        Self {
            team,
            outcome,
            metrics: BeliefMetrics::from_belief(belief),
            leading: snapshot
                .ranked()
                .into_iter()
                .take(POSTERIOR_LINES)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub model: String,
    pub win_chance: f64,
    pub teams: Vec<TeamEvaluation>,
    pub best: Option<TeamEvaluation>,
    pub cache: Option<CacheStats>,
    pub posteriors: Vec<PosteriorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DualReport {
    pub belief_model: String,
    pub real_model: String,
    pub belief_win_chance: f64,
    pub real_win_chance: f64,
}

impl DualReport {
    /// Win chance given up by planning with the wrong model.
    pub fn regret(&self) -> f64 {
        self.belief_win_chance - self.real_win_chance
    }
}

pub struct SummaryReport<'a> {
    pub run_id: &'a str,
    pub players: usize,
    pub spies: usize,
    pub evaluation: &'a EvaluationReport,
    pub dual: Option<&'a DualReport>,
    pub sweep: Option<&'a SweepSummary>,
    pub simulation: Option<(&'a str, &'a SimulationSummary)>,
}

impl SummaryReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Win Chance Summary: {}\n", self.run_id);
        let _ = writeln!(
            out,
            "{} players, {} spies. Resistance planning with model `{}`.\n",
            self.players, self.spies, self.evaluation.model
        );
        self.render_evaluation(&mut out);
        if let Some(dual) = self.dual {
            render_dual(&mut out, dual);
        }
        if let Some(sweep) = self.sweep {
            render_sweep(&mut out, sweep);
        }
        if let Some((model, simulation)) = self.simulation {
            render_simulation(&mut out, model, simulation);
        }
        out
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.render()).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })
    }

    fn render_evaluation(&self, out: &mut String) {
        let evaluation = self.evaluation;
        let _ = writeln!(out, "## Opening position\n");
        let _ = writeln!(out, "Optimal win chance: {:.6}\n", evaluation.win_chance);
        out.push_str("| Team | P(success) | Win if success | Win if fail | Expected |\n");
        out.push_str("|------|------------|----------------|-------------|----------|\n");
        for team in &evaluation.teams {
            let marker = if evaluation.best.is_some_and(|best| best.team == team.team) {
                " *"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "| {}{} | {:.4} | {:.4} | {:.4} | {:.6} |",
                team.team,
                marker,
                team.chance_of_success,
                team.win_after_success,
                team.win_after_fail,
                team.chance
            );
        }
        out.push('\n');

        if let Some(cache) = evaluation.cache {
            let _ = writeln!(
                out,
                "Cache: {} hits, {} misses, {} entries, {} evictions\n",
                cache.hits, cache.misses, cache.entries, cache.evictions
            );
        }

        for posterior in &evaluation.posteriors {
            let _ = writeln!(
                out,
                "### After {} on {}\n",
                posterior.outcome.symbol(),
                posterior.team
            );
            let _ = writeln!(
                out,
                "Total mass {:.6}, entropy {:.4} nats, {} hypotheses in support\n",
                posterior.metrics.total_mass, posterior.metrics.entropy, posterior.metrics.support
            );
            out.push_str("```\n");
            for entry in &posterior.leading {
                let _ = writeln!(out, "{} {:.6}", entry.roles, entry.mass);
            }
            out.push_str("```\n\n");
        }
    }
}

fn render_dual(out: &mut String, dual: &DualReport) {
    let _ = writeln!(out, "## Model mismatch\n");
    out.push_str("| Planned with | Spies follow | Planned chance | Real chance | Regret |\n");
    out.push_str("|--------------|--------------|----------------|-------------|--------|\n");
    let _ = writeln!(
        out,
        "| {} | {} | {:.6} | {:.6} | {:+.6} |\n",
        dual.belief_model,
        dual.real_model,
        dual.belief_win_chance,
        dual.real_win_chance,
        dual.regret()
    );
}

fn render_sweep(out: &mut String, sweep: &SweepSummary) {
    let _ = writeln!(out, "## Constant fail probability sweep\n");
    out.push_str("| Fail probability | Win chance |\n");
    out.push_str("|------------------|------------|\n");
    for point in &sweep.points {
        let _ = writeln!(
            out,
            "| {:.2} | {:.6} |",
            point.fail_probability, point.win_chance
        );
    }
    out.push('\n');
    if let Some(optimum) = sweep.spy_optimum() {
        let _ = writeln!(
            out,
            "Spies do best at p = {:.2} (resistance win chance {:.6}).\n",
            optimum.fail_probability, optimum.win_chance
        );
    }
}

fn render_simulation(out: &mut String, model: &str, simulation: &SimulationSummary) {
    let _ = writeln!(out, "## Monte-Carlo check (`{model}`)\n");
    let _ = writeln!(
        out,
        "{} games, resistance won {} ({:.4}, 95% CI [{:.4}, {:.4}]). Exact {:.6}, z = {}, p = {:.3}.\n",
        simulation.games,
        simulation.resistance_wins,
        simulation.win_rate,
        simulation.ci95.0,
        simulation.ci95.1,
        simulation.exact,
        simulation
            .z_score
            .map(|z| format!("{z:+.3}"))
            .unwrap_or_else(|| "n/a".to_string()),
        simulation.p_value
    );
    out.push_str("| Spies (R) | Games | Resistance wins | Win rate | 95% CI |\n");
    out.push_str("|-----------|-------|-----------------|----------|--------|\n");
    for hypothesis in &simulation.hypotheses {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {:.3} | [{:.3}, {:.3}] |",
            hypothesis.roles,
            hypothesis.games,
            hypothesis.resistance_wins,
            hypothesis.win_rate,
            hypothesis.ci95.0,
            hypothesis.ci95.1
        );
    }
    out.push('\n');
}

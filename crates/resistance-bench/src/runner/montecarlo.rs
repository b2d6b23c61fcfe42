use rand::{SeedableRng, rngs::StdRng};
use resistance_core::{BehaviorModel, BeliefState, GameConfig, ResultSequence, Solver};
use tracing::{Level, event};

use super::RunnerError;
use crate::analytics::{SimulationCollector, SimulationSummary};
use crate::config::SimulationConfig;

/// Plays `games_per_hypothesis` games against every role assignment and compares
/// the pooled resistance win rate with the exact opening value.
///
/// One solver serves every game so its value cache carries across playouts.
pub fn run_simulation(
    game: &GameConfig,
    model: &BehaviorModel,
    simulation: &SimulationConfig,
) -> Result<SimulationSummary, RunnerError> {
    let results = ResultSequence::new();
    let belief = BeliefState::uniform(game.hypothesis_space());
    let mut solver = Solver::new(game, model);
    let mut rng = StdRng::seed_from_u64(simulation.seed.unwrap_or(0));

    let exact = solver.win_chance(1, &results, &belief)?;
    let hypotheses = game.hypothesis_space().as_slice();
    let mut collector = SimulationCollector::new(hypotheses);

    for &truth in hypotheses {
        let mut wins = 0usize;
        for _ in 0..simulation.games_per_hypothesis {
            let outcome = solver.simulate_game(1, &results, &belief, truth, &mut rng)?;
            if !outcome.spies_win() {
                wins += 1;
            }
            collector.record(truth, outcome)?;
        }
        event!(
            target: "resistance_bench::montecarlo",
            Level::DEBUG,
            truth = %truth,
            games = simulation.games_per_hypothesis,
            wins,
            "hypothesis simulated"
        );
    }

    let summary = collector.finalize(exact)?;
    event!(
        target: "resistance_bench::montecarlo",
        Level::INFO,
        games = summary.games,
        win_rate = summary.win_rate,
        exact,
        p_value = summary.p_value,
        cache = ?solver.cache_stats(),
        "simulation finished"
    );
    Ok(summary)
}

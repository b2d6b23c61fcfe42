use resistance_core::{BehaviorModel, BeliefState, GameConfig, ResultSequence, SolveError, Solver};
use tracing::{Level, event};

use crate::analytics::{SweepPoint, SweepSummary};
use crate::config::SweepConfig;

/// Opening win chance for each constant fail probability in the grid.
pub fn run_sweep(game: &GameConfig, sweep: &SweepConfig) -> Result<SweepSummary, SolveError> {
    let results = ResultSequence::new();
    let belief = BeliefState::uniform(game.hypothesis_space());

    let mut points = Vec::new();
    for fail_probability in sweep.grid() {
        let model = BehaviorModel::constant(game, fail_probability)?;
        let win_chance = Solver::new(game, &model).win_chance(1, &results, &belief)?;
        event!(
            target: "resistance_bench::sweep",
            Level::INFO,
            fail_probability,
            win_chance,
            "sweep point"
        );
        points.push(SweepPoint {
            fail_probability,
            win_chance,
        });
    }
    Ok(SweepSummary::new(points))
}

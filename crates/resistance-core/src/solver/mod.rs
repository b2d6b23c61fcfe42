//! Backward-induction search over mission rounds.
//!
//! - `value`: optimal resistance win chance under one behaviour model.
//! - `dual`: team choice planned under an assumed model, scored under the real one.
//! - `simulate`: one sampled playout against a known role assignment.

mod dual;
mod simulate;
mod value;

pub use dual::DualSolver;
pub use simulate::{GameOutcome, SimulatedGame, SimulatedMission};
pub use value::{Solver, TeamEvaluation};

use crate::behavior::{BehaviorError, BehaviorModel};
use crate::belief::BeliefState;
use crate::game::config::GameConfig;
use crate::model::hypothesis::Hypothesis;
use crate::model::outcome::ResultSequence;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
    #[error("round {round} is outside 1..={final_round}")]
    InvalidRound { round: u8, final_round: u8 },
    #[error("belief covers {found} hypotheses but the game has {expected}")]
    BeliefMismatch { expected: usize, found: usize },
    #[error("round {0} has no legal team")]
    NoLegalTeam(u8),
}

/// Where a search position sits relative to the end of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    ResistanceWon,
    SpiesWon,
    FinalRound,
    Open,
}

pub(crate) fn stage(
    config: &GameConfig,
    round: u8,
    results: &ResultSequence,
) -> Result<Stage, SolveError> {
    let final_round = config.final_round();
    if round == 0 || round > final_round {
        return Err(SolveError::InvalidRound { round, final_round });
    }
    if results.successes() >= config.wins_needed() {
        return Ok(Stage::ResistanceWon);
    }
    if results.fails() >= config.wins_needed() {
        return Ok(Stage::SpiesWon);
    }
    if round == final_round {
        return Ok(Stage::FinalRound);
    }
    Ok(Stage::Open)
}

pub(crate) fn check_belief(config: &GameConfig, belief: &BeliefState) -> Result<(), SolveError> {
    let expected = config.hypothesis_space().len();
    if belief.len() != expected {
        return Err(SolveError::BeliefMismatch {
            expected,
            found: belief.len(),
        });
    }
    Ok(())
}

/// Optimal resistance win chance from a position, memoized for this call.
pub fn win_chance(
    config: &GameConfig,
    model: &BehaviorModel,
    round: u8,
    results: &ResultSequence,
    belief: &BeliefState,
) -> Result<f64, SolveError> {
    Solver::new(config, model).win_chance(round, results, belief)
}

/// Win chance under `real_model` when teams are chosen assuming `belief_model`.
pub fn win_chance_real(
    config: &GameConfig,
    belief_model: &BehaviorModel,
    real_model: &BehaviorModel,
    round: u8,
    results: &ResultSequence,
    belief: &BeliefState,
    real: &BeliefState,
) -> Result<f64, SolveError> {
    DualSolver::new(config, belief_model, real_model).win_chance_real(round, results, belief, real)
}

/// Samples one game against `truth`, choosing teams with the optimal policy.
pub fn simulate_game<R: Rng + ?Sized>(
    config: &GameConfig,
    model: &BehaviorModel,
    round: u8,
    results: &ResultSequence,
    belief: &BeliefState,
    truth: Hypothesis,
    rng: &mut R,
) -> Result<GameOutcome, SolveError> {
    Solver::new(config, model).simulate_game(round, results, belief, truth, rng)
}

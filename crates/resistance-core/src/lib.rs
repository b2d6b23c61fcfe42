#![deny(warnings)]
//! Win-probability engine for the seven-seat hidden-role mission game.
//!
//! The resistance sends teams on five missions while three hidden spies decide
//! whether to sabotage. Given a behaviour model for the spies, the engine keeps a
//! Bayesian belief over every role assignment and solves the mission tree by
//! backward induction for the team policy that maximizes the resistance's win
//! chance.

pub mod behavior;
pub mod belief;
pub mod game;
pub mod model;
pub mod solver;

pub use behavior::{BehaviorError, BehaviorKey, BehaviorModel, MissionCtx};
pub use belief::{BeliefState, DEGENERATE_MASS};
pub use game::config::{ConfigError, GameConfig, MissionSpec};
pub use model::hypothesis::{Hypothesis, HypothesisSpace};
pub use model::outcome::{MissionOutcome, ResultSequence};
pub use model::team::Team;
pub use solver::{
    DualSolver, GameOutcome, SolveError, Solver, TeamEvaluation, simulate_game, win_chance,
    win_chance_real,
};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "resistance-odds"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

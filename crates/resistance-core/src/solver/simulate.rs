use super::{SolveError, Solver, Stage, check_belief, stage};
use crate::behavior::MissionCtx;
use crate::belief::BeliefState;
use crate::model::hypothesis::Hypothesis;
use crate::model::outcome::{MissionOutcome, ResultSequence};
use crate::model::team::Team;
use rand::Rng;
use serde::Serialize;
use tracing::{Level, debug, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    ResistanceWin,
    SpyWin,
}

impl GameOutcome {
    pub const fn spies_win(self) -> bool {
        matches!(self, GameOutcome::SpyWin)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedMission {
    pub round: u8,
    pub team: Team,
    /// Expected win chance of the chosen team when it was picked.
    pub chance: f64,
    pub outcome: MissionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedGame {
    pub truth: Hypothesis,
    pub missions: Vec<SimulatedMission>,
    pub results: ResultSequence,
    pub outcome: GameOutcome,
}

impl<'a> Solver<'a> {
    /// Draws one game: the best team is sent each round and its result is
    /// sampled from the behaviour of the actual `truth` assignment.
    ///
    /// At the final round the resistance wins exactly when the belief's most
    /// likely hypothesis is `truth`.
    pub fn play_out<R: Rng + ?Sized>(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
        truth: Hypothesis,
        rng: &mut R,
    ) -> Result<SimulatedGame, SolveError> {
        let config = self.config();
        let model = self.model();
        check_belief(config, belief)?;

        let mut round = round;
        let mut results = results.clone();
        let mut belief = belief.clone();
        let mut missions = Vec::new();

        let outcome = loop {
            match stage(config, round, &results)? {
                Stage::ResistanceWon => break GameOutcome::ResistanceWin,
                Stage::SpiesWon => break GameOutcome::SpyWin,
                Stage::FinalRound => {
                    let identified = belief.most_likely().map(|(h, _)| h) == Some(truth);
                    break if identified {
                        GameOutcome::ResistanceWin
                    } else {
                        GameOutcome::SpyWin
                    };
                }
                Stage::Open => {}
            }

            let choice = self
                .best_team(round, &results, &belief)?
                .ok_or(SolveError::NoLegalTeam(round))?;
            let ctx = MissionCtx::new(config, round, choice.team, &results);
            let p_success = model.prob_success(&ctx, truth)?;
            let outcome = if rng.r#gen::<f64>() < p_success {
                MissionOutcome::Success
            } else {
                MissionOutcome::Fail
            };
            let next_belief = belief.update_on_outcome(&ctx, model, outcome)?;
            event!(
                Level::TRACE,
                round,
                team = %choice.team,
                p_success,
                ?outcome,
                "mission drawn"
            );

            missions.push(SimulatedMission {
                round,
                team: choice.team,
                chance: choice.chance,
                outcome,
            });
            results = results.extended(outcome);
            belief = next_belief;
            round += 1;
        };

        debug!(truth = %truth, results = %results, ?outcome, "simulated game finished");
        Ok(SimulatedGame {
            truth,
            missions,
            results,
            outcome,
        })
    }

    pub fn simulate_game<R: Rng + ?Sized>(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
        truth: Hypothesis,
        rng: &mut R,
    ) -> Result<GameOutcome, SolveError> {
        self.play_out(round, results, belief, truth, rng)
            .map(|game| game.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorModel;
    use crate::game::config::GameConfig;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn same_seed_same_playout() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = BeliefState::uniform(config.hypothesis_space());
        let truth = config.hypothesis_space().as_slice()[17];
        let mut solver = Solver::new(&config, &model);

        let mut rng_a = SmallRng::seed_from_u64(42);
        let mut rng_b = SmallRng::seed_from_u64(42);
        let a = solver
            .play_out(1, &ResultSequence::new(), &belief, truth, &mut rng_a)
            .unwrap();
        let b = solver
            .play_out(1, &ResultSequence::new(), &belief, truth, &mut rng_b)
            .unwrap();
        assert_eq!(a.results, b.results);
        assert_eq!(a.outcome, b.outcome);
        assert!(!a.missions.is_empty() && a.missions.len() <= 4);
        assert_eq!(a.missions[0].team, Team::from_seats(&[0, 1]).unwrap());
    }

    #[test]
    fn decided_history_returns_immediately() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = BeliefState::uniform(config.hypothesis_space());
        let truth = config.hypothesis_space().as_slice()[0];
        let mut rng = SmallRng::seed_from_u64(1);
        let lost = ResultSequence::from_outcomes([MissionOutcome::Fail; 3]);
        let outcome = Solver::new(&config, &model)
            .simulate_game(4, &lost, &belief, truth, &mut rng)
            .unwrap();
        assert!(outcome.spies_win());
    }

    #[test]
    fn table_without_spies_always_succeeds() {
        use crate::game::config::MissionSpec;
        let config = GameConfig::new(
            5,
            0,
            3,
            vec![
                MissionSpec::combinatorial(2, 1),
                MissionSpec::combinatorial(3, 1),
                MissionSpec::combinatorial(2, 1),
                MissionSpec::combinatorial(3, 1),
                MissionSpec::combinatorial(3, 1),
            ],
        )
        .unwrap();
        let model = BehaviorModel::new();
        assert!(model.validate_for(&config).is_ok());
        let belief = BeliefState::uniform(config.hypothesis_space());
        let truth = config.hypothesis_space().as_slice()[0];
        let mut rng = SmallRng::seed_from_u64(7);
        let game = Solver::new(&config, &model)
            .play_out(1, &ResultSequence::new(), &belief, truth, &mut rng)
            .unwrap();
        assert_eq!(game.outcome, GameOutcome::ResistanceWin);
        assert_eq!(game.results.successes(), 3);
        assert_eq!(game.missions.len(), 3);
        assert!(game.missions.iter().all(|m| m.chance == 1.0));
    }

    #[test]
    fn final_round_checks_identification() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let space = config.hypothesis_space();
        let truth = space.as_slice()[9];
        let belief = BeliefState::certain(space, &truth).unwrap();
        let results = ResultSequence::from_outcomes([
            MissionOutcome::Success,
            MissionOutcome::Fail,
            MissionOutcome::Success,
            MissionOutcome::Fail,
        ]);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut solver = Solver::new(&config, &model);
        assert_eq!(
            solver
                .simulate_game(5, &results, &belief, truth, &mut rng)
                .unwrap(),
            GameOutcome::ResistanceWin
        );
        let other = space.as_slice()[10];
        assert_eq!(
            solver
                .simulate_game(5, &results, &belief, other, &mut rng)
                .unwrap(),
            GameOutcome::SpyWin
        );
    }
}

use super::{SolveError, Stage, check_belief, stage};
use crate::behavior::{BehaviorModel, MissionCtx};
use crate::belief::{BeliefCacheKey, BeliefState, CacheStats, ValueCache};
use crate::game::config::GameConfig;
use crate::model::outcome::{MissionOutcome, ResultSequence};
use crate::model::team::Team;
use serde::Serialize;
use tracing::{debug, trace};

/// Expected value of sending one team, given optimal play afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamEvaluation {
    pub team: Team,
    pub chance_of_success: f64,
    pub win_after_success: f64,
    pub win_after_fail: f64,
    pub chance: f64,
}

/// Single-model value function.
pub struct Solver<'a> {
    config: &'a GameConfig,
    model: &'a BehaviorModel,
    cache: Option<ValueCache>,
}

impl<'a> Solver<'a> {
    pub fn new(config: &'a GameConfig, model: &'a BehaviorModel) -> Self {
        Self::with_cache_capacity(config, model, ValueCache::DEFAULT_CAPACITY)
    }

    pub fn with_cache_capacity(
        config: &'a GameConfig,
        model: &'a BehaviorModel,
        capacity: usize,
    ) -> Self {
        Self {
            config,
            model,
            cache: Some(ValueCache::new(capacity)),
        }
    }

    /// Plain recursion; every position is re-evaluated each time it is reached.
    pub fn without_cache(config: &'a GameConfig, model: &'a BehaviorModel) -> Self {
        Self {
            config,
            model,
            cache: None,
        }
    }

    pub fn config(&self) -> &'a GameConfig {
        self.config
    }

    pub fn model(&self) -> &'a BehaviorModel {
        self.model
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ValueCache::stats)
    }

    /// Probability the resistance wins from this position when every remaining
    /// team is chosen to maximize that probability.
    pub fn win_chance(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
    ) -> Result<f64, SolveError> {
        check_belief(self.config, belief)?;
        let value = self.value(round, results, belief)?;
        debug!(
            round,
            results = %results,
            value,
            cache = ?self.cache_stats(),
            "win chance evaluated"
        );
        Ok(value)
    }

    /// Every legal team for the round with its expected value, in menu order.
    ///
    /// Terminal positions have no decision to make and yield an empty list.
    pub fn rank_teams(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
    ) -> Result<Vec<TeamEvaluation>, SolveError> {
        check_belief(self.config, belief)?;
        if stage(self.config, round, results)? != Stage::Open {
            return Ok(Vec::new());
        }
        let config = self.config;
        let teams = config.teams_for(round).unwrap_or_default();
        teams
            .iter()
            .map(|&team| self.evaluate_team(round, team, results, belief))
            .collect()
    }

    /// First team reaching the highest expected value.
    pub fn best_team(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
    ) -> Result<Option<TeamEvaluation>, SolveError> {
        let ranked = self.rank_teams(round, results, belief)?;
        let mut best: Option<TeamEvaluation> = None;
        for evaluation in ranked {
            match best {
                Some(top) if evaluation.chance <= top.chance => {}
                _ => best = Some(evaluation),
            }
        }
        Ok(best)
    }

    pub(super) fn value(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
    ) -> Result<f64, SolveError> {
        match stage(self.config, round, results)? {
            Stage::ResistanceWon => return Ok(1.0),
            Stage::SpiesWon => return Ok(0.0),
            Stage::FinalRound => return Ok(belief.max_mass()),
            Stage::Open => {}
        }

        let key = self
            .cache
            .as_ref()
            .map(|_| BeliefCacheKey::new(round, results, belief));
        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            if let Some(value) = cache.get(key) {
                return Ok(value);
            }
        }

        let config = self.config;
        let teams = config
            .teams_for(round)
            .ok_or(SolveError::NoLegalTeam(round))?;
        let mut best = 0.0f64;
        for &team in teams {
            let evaluation = self.evaluate_team(round, team, results, belief)?;
            best = best.max(evaluation.chance);
        }

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key) {
            cache.insert(key, best);
        }
        Ok(best)
    }

    pub(super) fn evaluate_team(
        &mut self,
        round: u8,
        team: Team,
        results: &ResultSequence,
        belief: &BeliefState,
    ) -> Result<TeamEvaluation, SolveError> {
        let ctx = MissionCtx::new(self.config, round, team, results);
        let chance_of_success = belief.chance_of_success(&ctx, self.model)?;

        let after_success = belief.update_on_outcome(&ctx, self.model, MissionOutcome::Success)?;
        let win_after_success = self.value(
            round + 1,
            &results.extended(MissionOutcome::Success),
            &after_success,
        )?;

        let after_fail = belief.update_on_outcome(&ctx, self.model, MissionOutcome::Fail)?;
        let win_after_fail = self.value(
            round + 1,
            &results.extended(MissionOutcome::Fail),
            &after_fail,
        )?;

        let chance =
            chance_of_success * win_after_success + (1.0 - chance_of_success) * win_after_fail;
        trace!(round, %team, chance_of_success, chance, "team evaluated");

        Ok(TeamEvaluation {
            team,
            chance_of_success,
            win_after_success,
            win_after_fail,
            chance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKey;

    fn uniform(config: &GameConfig) -> BeliefState {
        BeliefState::uniform(config.hypothesis_space())
    }

    #[test]
    fn decided_games_ignore_belief() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let mut solver = Solver::new(&config, &model);
        let belief = uniform(&config);
        let won = ResultSequence::from_outcomes([MissionOutcome::Success; 3]);
        let lost = ResultSequence::from_outcomes([MissionOutcome::Fail; 3]);
        assert_eq!(solver.win_chance(4, &won, &belief).unwrap(), 1.0);
        assert_eq!(solver.win_chance(4, &lost, &belief).unwrap(), 0.0);
    }

    #[test]
    fn final_round_returns_top_mass() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let space = config.hypothesis_space();
        let mut mass = vec![0.01; 35];
        mass[20] = 0.66;
        let belief = BeliefState::from_masses(space, mass).unwrap();
        let results = ResultSequence::from_outcomes([
            MissionOutcome::Success,
            MissionOutcome::Fail,
            MissionOutcome::Success,
            MissionOutcome::Fail,
        ]);
        let value = Solver::new(&config, &model)
            .win_chance(5, &results, &belief)
            .unwrap();
        assert_eq!(value, 0.66);
    }

    #[test]
    fn opening_position_is_a_proper_probability() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = uniform(&config);
        let results = ResultSequence::new();
        let first = Solver::new(&config, &model)
            .win_chance(1, &results, &belief)
            .unwrap();
        let second = Solver::new(&config, &model)
            .win_chance(1, &results, &belief)
            .unwrap();
        assert!(first > 0.0 && first < 1.0, "got {first}");
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn memoized_matches_plain_recursion() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = uniform(&config);
        let results = ResultSequence::from_outcomes([MissionOutcome::Fail]);
        let mut memo = Solver::new(&config, &model);
        let memoized = memo.win_chance(2, &results, &belief).unwrap();
        let plain = Solver::without_cache(&config, &model)
            .win_chance(2, &results, &belief)
            .unwrap();
        assert_eq!(memoized.to_bits(), plain.to_bits());
        assert!(memo.cache_stats().unwrap().entries > 0);
    }

    #[test]
    fn best_team_value_equals_win_chance() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = uniform(&config);
        let results = ResultSequence::from_outcomes([MissionOutcome::Success]);
        let mut solver = Solver::new(&config, &model);
        let ranked = solver.rank_teams(2, &results, &belief).unwrap();
        assert_eq!(ranked.len(), 3);
        let best = solver.best_team(2, &results, &belief).unwrap().unwrap();
        let value = solver.win_chance(2, &results, &belief).unwrap();
        assert_eq!(best.chance, value);
        assert!(ranked.iter().all(|e| e.chance <= best.chance));
    }

    #[test]
    fn terminal_positions_have_no_ranking() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = uniform(&config);
        let mut solver = Solver::new(&config, &model);
        assert!(
            solver
                .rank_teams(5, &ResultSequence::new(), &belief)
                .unwrap()
                .is_empty()
        );
        assert!(
            solver
                .best_team(5, &ResultSequence::new(), &belief)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn missing_table_entry_propagates() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let mut partial = BehaviorModel::new();
        for (key, value) in model.iter().filter(|(k, _)| k.round != 3) {
            partial.set(key, value).unwrap();
        }
        let err = Solver::new(&config, &partial)
            .win_chance(1, &ResultSequence::new(), &uniform(&config))
            .unwrap_err();
        assert!(matches!(
            err,
            SolveError::Behavior(crate::behavior::BehaviorError::MissingEntry(BehaviorKey {
                round: 3,
                ..
            }))
        ));
    }

    #[test]
    fn rejects_round_outside_game() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let belief = uniform(&config);
        let mut solver = Solver::new(&config, &model);
        assert_eq!(
            solver.win_chance(0, &ResultSequence::new(), &belief),
            Err(SolveError::InvalidRound {
                round: 0,
                final_round: 5
            })
        );
        assert!(matches!(
            solver.win_chance(6, &ResultSequence::new(), &belief),
            Err(SolveError::InvalidRound { round: 6, .. })
        ));
    }

    #[test]
    fn rejects_belief_from_another_space() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let other = crate::model::hypothesis::HypothesisSpace::enumerate(5, 2).unwrap();
        let belief = BeliefState::uniform(&other);
        assert_eq!(
            Solver::new(&config, &model).win_chance(1, &ResultSequence::new(), &belief),
            Err(SolveError::BeliefMismatch {
                expected: 35,
                found: 10
            })
        );
    }
}

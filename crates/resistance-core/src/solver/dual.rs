use super::{SolveError, Solver, Stage, check_belief, stage};
use crate::behavior::{BehaviorModel, MissionCtx};
use crate::belief::{BeliefCacheKey, BeliefState, CacheStats, ValueCache};
use crate::game::config::GameConfig;
use crate::model::outcome::{MissionOutcome, ResultSequence};
use tracing::{debug, trace};

/// Scores a policy planned under an assumed behaviour model against the real one.
///
/// The resistance picks each team to maximize its win chance under the belief
/// model; the returned value is the chance that choice actually wins when spies
/// follow the real model. The two belief states share hypothesis ordering and
/// are advanced in lockstep, each under its own model.
pub struct DualSolver<'a> {
    planner: Solver<'a>,
    real_model: &'a BehaviorModel,
    cache: Option<ValueCache>,
}

impl<'a> DualSolver<'a> {
    pub fn new(
        config: &'a GameConfig,
        belief_model: &'a BehaviorModel,
        real_model: &'a BehaviorModel,
    ) -> Self {
        Self {
            planner: Solver::new(config, belief_model),
            real_model,
            cache: Some(ValueCache::default()),
        }
    }

    pub fn without_cache(
        config: &'a GameConfig,
        belief_model: &'a BehaviorModel,
        real_model: &'a BehaviorModel,
    ) -> Self {
        Self {
            planner: Solver::without_cache(config, belief_model),
            real_model,
            cache: None,
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ValueCache::stats)
    }

    pub fn planner_cache_stats(&self) -> Option<CacheStats> {
        self.planner.cache_stats()
    }

    pub fn win_chance_real(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
        real: &BeliefState,
    ) -> Result<f64, SolveError> {
        let config = self.planner.config();
        check_belief(config, belief)?;
        check_belief(config, real)?;
        let value = self.value(round, results, belief, real)?;
        debug!(
            round,
            results = %results,
            value,
            cache = ?self.cache_stats(),
            "real win chance evaluated"
        );
        Ok(value)
    }

    fn value(
        &mut self,
        round: u8,
        results: &ResultSequence,
        belief: &BeliefState,
        real: &BeliefState,
    ) -> Result<f64, SolveError> {
        let config = self.planner.config();
        match stage(config, round, results)? {
            Stage::ResistanceWon => return Ok(1.0),
            Stage::SpiesWon => return Ok(0.0),
            Stage::FinalRound => return Ok(real.mass_at_most_likely_of(belief)),
            Stage::Open => {}
        }

        let key = self
            .cache
            .as_ref()
            .map(|_| BeliefCacheKey::paired(round, results, belief, real));
        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            if let Some(value) = cache.get(key) {
                return Ok(value);
            }
        }

        let belief_model = self.planner.model();
        let teams = config
            .teams_for(round)
            .ok_or(SolveError::NoLegalTeam(round))?;
        // A team is only played once it beats a zero belief-model chance; when
        // every team is hopeless under the belief model nothing is played.
        let mut best_belief = 0.0;
        let mut played_real = 0.0;

        for &team in teams {
            let ctx = MissionCtx::new(config, round, team, results);
            let success_belief = belief.chance_of_success(&ctx, belief_model)?;
            let success_real = real.chance_of_success(&ctx, self.real_model)?;

            let mut believed = [0.0; 2];
            let mut realised = [0.0; 2];
            for (slot, outcome) in MissionOutcome::BOTH.into_iter().enumerate() {
                let next_results = results.extended(outcome);
                let next_belief = belief.update_on_outcome(&ctx, belief_model, outcome)?;
                let next_real = real.update_on_outcome(&ctx, self.real_model, outcome)?;
                believed[slot] = self.planner.value(round + 1, &next_results, &next_belief)?;
                realised[slot] = self.value(round + 1, &next_results, &next_belief, &next_real)?;
            }

            let chance_belief =
                success_belief * believed[0] + (1.0 - success_belief) * believed[1];
            let chance_real = success_real * realised[0] + (1.0 - success_real) * realised[1];
            trace!(round, %team, chance_belief, chance_real, "team evaluated under both models");

            if chance_belief > best_belief {
                best_belief = chance_belief;
                played_real = chance_real;
            }
        }

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key) {
            cache.insert(key, played_real);
        }
        Ok(played_real)
    }
}

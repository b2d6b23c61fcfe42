//! Spy sabotage model: how likely spies on a team are to fail the mission.

use crate::game::config::GameConfig;
use crate::model::hypothesis::Hypothesis;
use crate::model::outcome::ResultSequence;
use crate::model::team::Team;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Lookup key for a tabulated fail probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BehaviorKey {
    pub round: u8,
    /// Spies present on the mission team.
    pub spies: u8,
    /// Successful missions before this round.
    pub successes: u8,
}

impl BehaviorKey {
    pub const fn new(round: u8, spies: u8, successes: u8) -> Self {
        Self {
            round,
            spies,
            successes,
        }
    }
}

impl fmt::Display for BehaviorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.round, self.spies, self.successes)
    }
}

/// Serialized form of one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEntry {
    pub round: u8,
    pub spies: u8,
    pub successes: u8,
    pub fail_probability: f64,
}

impl BehaviorEntry {
    pub const fn key(&self) -> BehaviorKey {
        BehaviorKey::new(self.round, self.spies, self.successes)
    }
}

/// The mission being evaluated: round, team and the history leading to it.
#[derive(Debug, Clone, Copy)]
pub struct MissionCtx<'a> {
    config: &'a GameConfig,
    round: u8,
    team: Team,
    results: &'a ResultSequence,
}

impl<'a> MissionCtx<'a> {
    pub fn new(config: &'a GameConfig, round: u8, team: Team, results: &'a ResultSequence) -> Self {
        Self {
            config,
            round,
            team,
            results,
        }
    }

    pub fn config(&self) -> &'a GameConfig {
        self.config
    }

    pub fn round(&self) -> u8 {
        self.round
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn results(&self) -> &'a ResultSequence {
        self.results
    }
}

/// Partial table of spy fail probabilities keyed by [`BehaviorKey`].
///
/// Only non-forced states are tabulated; forced and unplayable states are
/// resolved by [`BehaviorModel::prob_fail`] before the table is consulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BehaviorEntry>", into = "Vec<BehaviorEntry>")]
pub struct BehaviorModel {
    table: BTreeMap<BehaviorKey, f64>,
}

impl BehaviorModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (BehaviorKey, f64)>,
    ) -> Result<Self, BehaviorError> {
        let mut model = Self::new();
        for (key, value) in entries {
            model.set(key, value)?;
        }
        Ok(model)
    }

    /// Every reachable key of `config` set to `fail_probability`.
    pub fn constant(config: &GameConfig, fail_probability: f64) -> Result<Self, BehaviorError> {
        Self::from_entries(
            config
                .behavior_keys()
                .into_iter()
                .map(|key| (key, fail_probability)),
        )
    }

    /// Hand-tuned table for the seven-player game: spies lie low on the opening
    /// pair mission and sabotage whenever they can afterwards.
    pub fn tuned() -> Self {
        const TABLE: [(u8, u8, u8, f64); 11] = [
            (1, 1, 0, 0.2),
            (1, 2, 0, 0.0),
            (2, 1, 0, 1.0),
            (2, 1, 1, 1.0),
            (2, 2, 0, 1.0),
            (2, 2, 1, 1.0),
            (2, 3, 0, 1.0),
            (2, 3, 1, 1.0),
            (3, 1, 1, 1.0),
            (3, 2, 1, 1.0),
            (3, 3, 1, 1.0),
        ];
        Self {
            table: TABLE
                .iter()
                .map(|&(round, spies, successes, p)| {
                    (BehaviorKey::new(round, spies, successes), p)
                })
                .collect(),
        }
    }

    /// Inserts or replaces an entry, returning the previous probability.
    pub fn set(
        &mut self,
        key: BehaviorKey,
        fail_probability: f64,
    ) -> Result<Option<f64>, BehaviorError> {
        if !(0.0..=1.0).contains(&fail_probability) {
            return Err(BehaviorError::ProbabilityOutOfRange {
                key,
                value: fail_probability,
            });
        }
        Ok(self.table.insert(key, fail_probability))
    }

    pub fn with_entry(
        mut self,
        key: BehaviorKey,
        fail_probability: f64,
    ) -> Result<Self, BehaviorError> {
        self.set(key, fail_probability)?;
        Ok(self)
    }

    pub fn get(&self, key: &BehaviorKey) -> Option<f64> {
        self.table.get(key).copied()
    }

    pub fn lookup(&self, key: BehaviorKey) -> Result<f64, BehaviorError> {
        self.get(&key).ok_or(BehaviorError::MissingEntry(key))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BehaviorKey, f64)> + '_ {
        self.table.iter().map(|(key, value)| (*key, *value))
    }

    /// Fails with the first reachable key of `config` the table lacks.
    pub fn validate_for(&self, config: &GameConfig) -> Result<(), BehaviorError> {
        match config
            .behavior_keys()
            .into_iter()
            .find(|key| !self.table.contains_key(key))
        {
            Some(missing) => Err(BehaviorError::MissingEntry(missing)),
            None => Ok(()),
        }
    }

    /// Probability that the mission in `ctx` fails when `hypothesis` holds.
    pub fn prob_fail(
        &self,
        ctx: &MissionCtx<'_>,
        hypothesis: Hypothesis,
    ) -> Result<f64, BehaviorError> {
        let threshold = ctx
            .config()
            .fail_threshold(ctx.round())
            .ok_or(BehaviorError::UnknownRound(ctx.round()))?;
        let spies = hypothesis.spies_on(ctx.team());
        if spies < threshold {
            return Ok(0.0);
        }

        // One result from the win total on either side: spies must fail now.
        let forced = ctx.config().wins_needed() - 1;
        let successes = ctx.results().successes();
        if successes >= forced || ctx.results().fails() >= forced {
            return Ok(1.0);
        }

        self.lookup(BehaviorKey::new(ctx.round(), spies as u8, successes as u8))
    }

    pub fn prob_success(
        &self,
        ctx: &MissionCtx<'_>,
        hypothesis: Hypothesis,
    ) -> Result<f64, BehaviorError> {
        Ok(1.0 - self.prob_fail(ctx, hypothesis)?)
    }
}

impl TryFrom<Vec<BehaviorEntry>> for BehaviorModel {
    type Error = BehaviorError;

    fn try_from(entries: Vec<BehaviorEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(entries.into_iter().map(|e| (e.key(), e.fail_probability)))
    }
}

impl From<BehaviorModel> for Vec<BehaviorEntry> {
    fn from(model: BehaviorModel) -> Self {
        model
            .table
            .into_iter()
            .map(|(key, fail_probability)| BehaviorEntry {
                round: key.round,
                spies: key.spies,
                successes: key.successes,
                fail_probability,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BehaviorError {
    #[error("behavior model has no fail probability for (round, spies, successes) = {0}")]
    MissingEntry(BehaviorKey),
    #[error("fail probability {value} for {key} is outside [0, 1]")]
    ProbabilityOutOfRange { key: BehaviorKey, value: f64 },
    #[error("round {0} is not part of the game configuration")]
    UnknownRound(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::outcome::MissionOutcome;

    fn team(seats: &[usize]) -> Team {
        Team::from_seats(seats).unwrap()
    }

    fn spies(seats: &[usize]) -> Hypothesis {
        let mut roles = [false; 7];
        for &seat in seats {
            roles[seat] = true;
        }
        Hypothesis::from_roles(&roles).unwrap()
    }

    #[test]
    fn no_spy_on_team_never_fails() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let results = ResultSequence::new();
        let ctx = MissionCtx::new(&config, 1, team(&[0, 1]), &results);
        assert_eq!(model.prob_fail(&ctx, spies(&[2, 3, 4])).unwrap(), 0.0);
        assert_eq!(model.prob_success(&ctx, spies(&[2, 3, 4])).unwrap(), 1.0);
    }

    #[test]
    fn table_lookup_uses_spy_count_on_team() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::tuned();
        let results = ResultSequence::new();
        let ctx = MissionCtx::new(&config, 1, team(&[0, 1]), &results);
        assert_eq!(model.prob_fail(&ctx, spies(&[0, 3, 4])).unwrap(), 0.2);
        assert_eq!(model.prob_fail(&ctx, spies(&[0, 1, 4])).unwrap(), 0.0);
    }

    #[test]
    fn round_four_single_spy_cannot_fail() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::new();
        let results = ResultSequence::from_outcomes([
            MissionOutcome::Success,
            MissionOutcome::Fail,
            MissionOutcome::Success,
        ]);
        let ctx = MissionCtx::new(&config, 4, team(&[0, 1, 2, 3]), &results);
        assert_eq!(model.prob_fail(&ctx, spies(&[0, 4, 5])).unwrap(), 0.0);
        assert_eq!(model.prob_fail(&ctx, spies(&[0, 1, 5])).unwrap(), 1.0);
    }

    #[test]
    fn forced_states_ignore_table() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::new();
        let two_wins = ResultSequence::from_outcomes([MissionOutcome::Success; 2]);
        let two_losses = ResultSequence::from_outcomes([MissionOutcome::Fail; 2]);
        for results in [&two_wins, &two_losses] {
            let ctx = MissionCtx::new(&config, 3, team(&[0, 1, 2]), results);
            assert_eq!(model.prob_fail(&ctx, spies(&[2, 5, 6])).unwrap(), 1.0);
        }
    }

    #[test]
    fn missing_entry_is_reported() {
        let config = GameConfig::seven_player();
        let model = BehaviorModel::new();
        let results = ResultSequence::new();
        let ctx = MissionCtx::new(&config, 1, team(&[0, 1]), &results);
        assert_eq!(
            model.prob_fail(&ctx, spies(&[0, 2, 3])),
            Err(BehaviorError::MissingEntry(BehaviorKey::new(1, 1, 0)))
        );
        assert_eq!(
            model.validate_for(&config),
            Err(BehaviorError::MissingEntry(BehaviorKey::new(1, 1, 0)))
        );
    }

    #[test]
    fn unknown_round_is_reported() {
        let config = GameConfig::seven_player();
        let results = ResultSequence::new();
        let ctx = MissionCtx::new(&config, 9, team(&[0, 1]), &results);
        assert_eq!(
            BehaviorModel::tuned().prob_fail(&ctx, spies(&[0, 1, 2])),
            Err(BehaviorError::UnknownRound(9))
        );
    }

    #[test]
    fn tuned_and_constant_cover_reachable_keys() {
        let config = GameConfig::seven_player();
        assert!(BehaviorModel::tuned().validate_for(&config).is_ok());
        let constant = BehaviorModel::constant(&config, 0.4).unwrap();
        assert_eq!(constant.len(), 11);
        assert!(constant.iter().all(|(_, p)| p == 0.4));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = BehaviorModel::constant(&GameConfig::seven_player(), 1.5).unwrap_err();
        assert!(matches!(err, BehaviorError::ProbabilityOutOfRange { .. }));
        assert!(BehaviorModel::new().set(BehaviorKey::new(1, 1, 0), f64::NAN).is_err());
    }

    #[test]
    fn deserializes_from_entry_list() {
        let json = r#"[
            {"round": 1, "spies": 1, "successes": 0, "fail_probability": 0.25},
            {"round": 2, "spies": 2, "successes": 1, "fail_probability": 1.0}
        ]"#;
        let model: BehaviorModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.get(&BehaviorKey::new(1, 1, 0)), Some(0.25));
        assert_eq!(model.len(), 2);

        let bad = r#"[{"round": 1, "spies": 1, "successes": 0, "fail_probability": -0.1}]"#;
        assert!(serde_json::from_str::<BehaviorModel>(bad).is_err());
    }
}

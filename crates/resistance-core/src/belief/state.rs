use crate::behavior::{BehaviorError, BehaviorModel, MissionCtx};
use crate::model::hypothesis::{Hypothesis, HypothesisSpace};
use crate::model::outcome::MissionOutcome;
use std::sync::Arc;
use thiserror::Error;

/// Posterior mass at or below this total marks the observed outcome as impossible.
pub const DEGENERATE_MASS: f64 = 1e-6;

/// Probability mass per hypothesis, aligned with a [`HypothesisSpace`].
///
/// Updates return a fresh state; the receiver is never modified, so a parent
/// state can be shared by every branch explored from it.
#[derive(Debug, Clone)]
pub struct BeliefState {
    hypotheses: Arc<[Hypothesis]>,
    mass: Vec<f64>,
}

impl BeliefState {
    /// Uniform prior over every hypothesis in `space`.
    pub fn uniform(space: &HypothesisSpace) -> Self {
        let weight = if space.is_empty() {
            0.0
        } else {
            1.0 / space.len() as f64
        };
        Self {
            hypotheses: space.shared(),
            mass: vec![weight; space.len()],
        }
    }

    /// Explicit masses in the space's enumeration order.
    pub fn from_masses(space: &HypothesisSpace, mass: Vec<f64>) -> Result<Self, BeliefError> {
        if mass.len() != space.len() {
            return Err(BeliefError::LengthMismatch {
                expected: space.len(),
                found: mass.len(),
            });
        }
        if let Some((index, value)) = mass
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(BeliefError::InvalidMass { index, value });
        }
        Ok(Self {
            hypotheses: space.shared(),
            mass,
        })
    }

    /// Point mass on `hypothesis`.
    pub fn certain(space: &HypothesisSpace, hypothesis: &Hypothesis) -> Result<Self, BeliefError> {
        let index = space
            .position(hypothesis)
            .ok_or(BeliefError::UnknownHypothesis(*hypothesis))?;
        let mut mass = vec![0.0; space.len()];
        mass[index] = 1.0;
        Ok(Self {
            hypotheses: space.shared(),
            mass,
        })
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    pub fn masses(&self) -> &[f64] {
        &self.mass
    }

    pub fn get(&self, hypothesis: &Hypothesis) -> Option<f64> {
        self.hypotheses
            .binary_search(hypothesis)
            .ok()
            .map(|index| self.mass[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hypothesis, f64)> + '_ {
        self.hypotheses.iter().copied().zip(self.mass.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Largest single mass, or zero for an empty state.
    pub fn max_mass(&self) -> f64 {
        self.mass.iter().copied().fold(0.0, f64::max)
    }

    /// Index of the first hypothesis holding the largest mass.
    pub fn most_likely_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, &value) in self.mass.iter().enumerate() {
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((index, value)),
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn most_likely(&self) -> Option<(Hypothesis, f64)> {
        self.most_likely_index()
            .map(|index| (self.hypotheses[index], self.mass[index]))
    }

    /// Mass this state assigns to the hypothesis that `other` rates most likely.
    ///
    /// Both states must share the same hypothesis ordering.
    pub fn mass_at_most_likely_of(&self, other: &BeliefState) -> f64 {
        other
            .most_likely_index()
            .and_then(|index| self.mass.get(index).copied())
            .unwrap_or(0.0)
    }

    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.total() - 1.0).abs() <= tolerance
    }

    /// Marginal probability that the mission in `ctx` succeeds under this belief.
    pub fn chance_of_success(
        &self,
        ctx: &MissionCtx<'_>,
        model: &BehaviorModel,
    ) -> Result<f64, BehaviorError> {
        let mut chance = 0.0;
        for (hypothesis, mass) in self.iter() {
            chance += mass * model.prob_success(ctx, hypothesis)?;
        }
        Ok(chance)
    }

    /// Bayesian posterior after observing `outcome` for the mission in `ctx`.
    ///
    /// When the updated total is at most [`DEGENERATE_MASS`] the unnormalized
    /// masses are returned as-is and will not sum to one.
    pub fn update_on_outcome(
        &self,
        ctx: &MissionCtx<'_>,
        model: &BehaviorModel,
        outcome: MissionOutcome,
    ) -> Result<BeliefState, BehaviorError> {
        let mut mass = Vec::with_capacity(self.mass.len());
        let mut total = 0.0;
        for (hypothesis, prior) in self.iter() {
            let likelihood = match outcome {
                MissionOutcome::Success => model.prob_success(ctx, hypothesis)?,
                MissionOutcome::Fail => model.prob_fail(ctx, hypothesis)?,
            };
            let posterior = prior * likelihood;
            total += posterior;
            mass.push(posterior);
        }

        if total > DEGENERATE_MASS {
            for value in &mut mass {
                *value /= total;
            }
        } else {
            tracing::trace!(
                round = ctx.round(),
                team = %ctx.team(),
                ?outcome,
                total,
                "degenerate evidence; keeping unnormalized posterior"
            );
        }

        Ok(BeliefState {
            hypotheses: Arc::clone(&self.hypotheses),
            mass,
        })
    }

    /// Bit patterns of each mass with negative zero folded onto zero.
    pub(crate) fn mass_bits(&self) -> Box<[u64]> {
        self.mass.iter().map(|value| (value + 0.0).to_bits()).collect()
    }
}

impl PartialEq for BeliefState {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.hypotheses, &other.hypotheses) || self.hypotheses == other.hypotheses)
            && self.mass == other.mass
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BeliefError {
    #[error("expected {expected} masses, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("mass {value} at index {index} is not a finite non-negative number")]
    InvalidMass { index: usize, value: f64 },
    #[error("hypothesis {0} is not part of the space")]
    UnknownHypothesis(Hypothesis),
}

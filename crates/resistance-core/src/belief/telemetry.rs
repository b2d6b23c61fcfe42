use super::BeliefState;
use crate::model::hypothesis::Hypothesis;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BeliefMetrics {
    pub total_mass: f64,
    /// Shannon entropy in nats of the normalized distribution.
    pub entropy: f64,
    /// Hypotheses holding non-zero mass.
    pub support: usize,
    pub top_hypothesis: Option<String>,
    pub top_mass: f64,
}

impl BeliefMetrics {
    pub fn from_belief(belief: &BeliefState) -> Self {
        let total_mass = belief.total();
        let mut entropy = 0.0;
        if total_mass > 0.0 {
            for &mass in belief.masses() {
                let p = mass / total_mass;
                if p > 0.0 {
                    entropy -= p * p.ln();
                }
            }
        }

        let top = belief.most_likely();
        Self {
            total_mass,
            entropy,
            support: belief.masses().iter().filter(|m| **m > 0.0).count(),
            top_hypothesis: top.map(|(h, _): (Hypothesis, f64)| h.to_string()),
            top_mass: top.map(|(_, mass)| mass).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;

    #[test]
    fn uniform_entropy_is_log_of_support() {
        let belief = BeliefState::uniform(GameConfig::seven_player().hypothesis_space());
        let metrics = BeliefMetrics::from_belief(&belief);
        assert_eq!(metrics.support, 35);
        assert!((metrics.entropy - (35f64).ln()).abs() < 1e-9);
        assert_eq!(metrics.top_hypothesis.as_deref(), Some("RRRBBBB"));
    }

    #[test]
    fn collapsed_state_has_zero_entropy() {
        let space = GameConfig::seven_player().hypothesis_space().clone();
        let belief = BeliefState::from_masses(&space, vec![0.0; 35]).unwrap();
        let metrics = BeliefMetrics::from_belief(&belief);
        assert_eq!(metrics.entropy, 0.0);
        assert_eq!(metrics.support, 0);
    }
}

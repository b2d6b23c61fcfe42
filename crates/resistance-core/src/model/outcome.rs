use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionOutcome {
    Success,
    Fail,
}

impl MissionOutcome {
    pub const BOTH: [MissionOutcome; 2] = [MissionOutcome::Success, MissionOutcome::Fail];

    pub const fn is_success(self) -> bool {
        matches!(self, MissionOutcome::Success)
    }

    pub const fn symbol(self) -> char {
        match self {
            MissionOutcome::Success => 'S',
            MissionOutcome::Fail => 'F',
        }
    }
}

/// Ordered history of mission outcomes for one game.
///
/// Extending a sequence always yields a new value so that sibling branches of a
/// search never share history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSequence {
    outcomes: Vec<MissionOutcome>,
}

impl ResultSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = MissionOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn fails(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    pub fn as_slice(&self) -> &[MissionOutcome] {
        &self.outcomes
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionOutcome> {
        self.outcomes.iter()
    }

    /// Returns a copy of this history with `outcome` appended.
    pub fn extended(&self, outcome: MissionOutcome) -> Self {
        let mut outcomes = Vec::with_capacity(self.outcomes.len() + 1);
        outcomes.extend_from_slice(&self.outcomes);
        outcomes.push(outcome);
        Self { outcomes }
    }
}

impl fmt::Display for ResultSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcomes.is_empty() {
            return f.write_str("-");
        }
        for outcome in &self.outcomes {
            write!(f, "{}", outcome.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_successes_and_fails() {
        let results = ResultSequence::from_outcomes([
            MissionOutcome::Success,
            MissionOutcome::Fail,
            MissionOutcome::Success,
        ]);
        assert_eq!(results.successes(), 2);
        assert_eq!(results.fails(), 1);
        assert_eq!(results.to_string(), "SFS");
    }

    #[test]
    fn extended_leaves_original_untouched() {
        let base = ResultSequence::from_outcomes([MissionOutcome::Fail]);
        let longer = base.extended(MissionOutcome::Success);
        assert_eq!(base.len(), 1);
        assert_eq!(longer.len(), 2);
        assert_eq!(longer.as_slice()[1], MissionOutcome::Success);
    }

    #[test]
    fn serializes_as_plain_list() {
        let results = ResultSequence::from_outcomes([MissionOutcome::Success]);
        assert_eq!(serde_json::to_string(&results).unwrap(), "[\"success\"]");
        assert_eq!(ResultSequence::new().to_string(), "-");
    }
}

use super::BeliefState;
use serde::{Deserialize, Serialize};

/// One hypothesis line: roles as `R` (spy) / `B` (resistance), seat 0 first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntry {
    pub roles: String,
    pub mass: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeliefSnapshot {
    pub total: f64,
    pub entries: Vec<SnapshotEntry>,
}

impl BeliefSnapshot {
    pub fn capture(belief: &BeliefState) -> Self {
        Self {
            total: belief.total(),
            entries: belief
                .iter()
                .map(|(hypothesis, mass)| SnapshotEntry {
                    roles: hypothesis.to_string(),
                    mass,
                })
                .collect(),
        }
    }

    /// Entries with non-zero mass, most likely first (stable for ties).
    pub fn ranked(&self) -> Vec<&SnapshotEntry> {
        let mut ranked: Vec<&SnapshotEntry> =
            self.entries.iter().filter(|entry| entry.mass > 0.0).collect();
        ranked.sort_by(|a, b| b.mass.total_cmp(&a.mass));
        ranked
    }

    /// Plain-text listing, one `roles mass` line per hypothesis.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("{} {}\n", entry.roles, entry.mass));
        }
        out
    }

    pub fn to_json(belief: &BeliefState) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Self::capture(belief))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;

    #[test]
    fn snapshot_serializes_to_json() {
        let belief = BeliefState::uniform(GameConfig::seven_player().hypothesis_space());
        let json = BeliefSnapshot::to_json(&belief).unwrap();
        assert!(json.contains("\"roles\": \"RRRBBBB\""));
        let restored = BeliefSnapshot::from_json(&json).unwrap();
        assert_eq!(restored.entries.len(), 35);
        assert!((restored.total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranked_drops_empty_entries() {
        let space = GameConfig::seven_player().hypothesis_space().clone();
        let mut mass = vec![0.0; 35];
        mass[2] = 0.3;
        mass[5] = 0.7;
        let belief = BeliefState::from_masses(&space, mass).unwrap();
        let snapshot = BeliefSnapshot::capture(&belief);
        let ranked = snapshot.ranked();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].mass, 0.7);
        assert_eq!(snapshot.render().lines().count(), 35);
    }
}

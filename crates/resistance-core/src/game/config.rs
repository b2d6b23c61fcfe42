//! Fixed mission table for a game: team sizes, team menus and sabotage thresholds.

use crate::behavior::BehaviorKey;
use crate::model::hypothesis::HypothesisSpace;
use crate::model::team::{MAX_SEATS, Team};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEVEN_PLAYER_TEAM_SIZES: [usize; 5] = [2, 3, 3, 4, 4];
const SEVEN_PLAYER_ROUND_ONE_MENU: &[&[usize]] = &[&[0, 1]];
const SEVEN_PLAYER_ROUND_TWO_MENU: &[&[usize]] = &[&[0, 1, 2], &[0, 2, 3], &[3, 4, 5]];
const DEFAULT_WINS_NEEDED: usize = 3;

/// Per-round mission requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSpec {
    pub team_size: usize,
    /// Minimum number of spies on the team for a fail to be playable.
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: usize,
    /// Explicit team menu; when absent every subset of `team_size` seats is legal.
    #[serde(default)]
    pub menu: Option<Vec<Team>>,
}

impl MissionSpec {
    pub fn combinatorial(team_size: usize, fail_threshold: usize) -> Self {
        Self {
            team_size,
            fail_threshold,
            menu: None,
        }
    }

    pub fn with_menu(team_size: usize, fail_threshold: usize, menu: Vec<Team>) -> Self {
        Self {
            team_size,
            fail_threshold,
            menu: Some(menu),
        }
    }
}

fn default_fail_threshold() -> usize {
    1
}

/// Immutable game configuration passed into every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    players: usize,
    spies: usize,
    wins_needed: usize,
    missions: Vec<MissionSpec>,
    teams: Vec<Vec<Team>>,
    space: HypothesisSpace,
}

impl GameConfig {
    /// Validates and assembles a configuration.
    pub fn new(
        players: usize,
        spies: usize,
        wins_needed: usize,
        missions: Vec<MissionSpec>,
    ) -> Result<Self, ConfigError> {
        if players > MAX_SEATS {
            return Err(ConfigError::TooManyPlayers {
                players,
                max: MAX_SEATS,
            });
        }
        if spies > players {
            return Err(ConfigError::SpiesExceedPlayers { spies, players });
        }
        if wins_needed == 0 {
            return Err(ConfigError::ZeroWinsNeeded);
        }
        if missions.is_empty() {
            return Err(ConfigError::NoRounds);
        }
        if missions.len() > u8::MAX as usize {
            return Err(ConfigError::TooManyRounds(missions.len()));
        }

        for (idx, mission) in missions.iter().enumerate() {
            let round = idx + 1;
            if mission.team_size == 0 || mission.team_size > players {
                return Err(ConfigError::TeamSize {
                    round,
                    size: mission.team_size,
                    players,
                });
            }
            if mission.fail_threshold == 0 {
                return Err(ConfigError::ZeroFailThreshold { round });
            }
            let Some(menu) = mission.menu.as_ref() else {
                continue;
            };
            if menu.is_empty() {
                return Err(ConfigError::EmptyMenu { round });
            }
            for team in menu {
                if team.seat_span() > players {
                    return Err(ConfigError::MenuSeat {
                        round,
                        team: team.to_string(),
                        players,
                    });
                }
                if team.size() != mission.team_size {
                    return Err(ConfigError::MenuTeamSize {
                        round,
                        team: team.to_string(),
                        size: mission.team_size,
                    });
                }
            }
        }

        Ok(Self::assemble(players, spies, wins_needed, missions))
    }

    /// The 7-player, 3-spy table with canonical menus for the first two rounds.
    pub fn seven_player() -> Self {
        let mut missions: Vec<MissionSpec> = SEVEN_PLAYER_TEAM_SIZES
            .iter()
            .enumerate()
            .map(|(idx, &size)| MissionSpec::combinatorial(size, if idx == 3 { 2 } else { 1 }))
            .collect();
        missions[0].menu = Some(menu_from_seats(SEVEN_PLAYER_ROUND_ONE_MENU));
        missions[1].menu = Some(menu_from_seats(SEVEN_PLAYER_ROUND_TWO_MENU));
        Self::assemble(7, 3, DEFAULT_WINS_NEEDED, missions)
    }

    fn assemble(
        players: usize,
        spies: usize,
        wins_needed: usize,
        missions: Vec<MissionSpec>,
    ) -> Self {
        let teams = missions
            .iter()
            .map(|mission| match mission.menu.as_ref() {
                Some(menu) => menu.clone(),
                None => Team::all_of_size(players, mission.team_size),
            })
            .collect();
        Self {
            players,
            spies,
            wins_needed,
            missions,
            teams,
            space: HypothesisSpace::build(players, spies),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players
    }

    pub fn spy_count(&self) -> usize {
        self.spies
    }

    /// Mission results either side needs to win outright.
    pub fn wins_needed(&self) -> usize {
        self.wins_needed
    }

    pub fn round_count(&self) -> usize {
        self.missions.len()
    }

    /// The deciding round, at which no further information is gathered.
    pub fn final_round(&self) -> u8 {
        self.missions.len() as u8
    }

    pub fn missions(&self) -> &[MissionSpec] {
        &self.missions
    }

    pub fn mission(&self, round: u8) -> Option<&MissionSpec> {
        let idx = (round as usize).checked_sub(1)?;
        self.missions.get(idx)
    }

    /// Legal teams for a 1-based round.
    pub fn teams_for(&self, round: u8) -> Option<&[Team]> {
        let idx = (round as usize).checked_sub(1)?;
        self.teams.get(idx).map(Vec::as_slice)
    }

    pub fn fail_threshold(&self, round: u8) -> Option<usize> {
        self.mission(round).map(|mission| mission.fail_threshold)
    }

    pub fn hypothesis_space(&self) -> &HypothesisSpace {
        &self.space
    }

    /// Every behaviour-table key a search over this configuration can consult.
    ///
    /// A key is reachable when the round precedes the final one, the spy count
    /// can play a fail on one of the round's teams, and neither side is one
    /// result away from winning (those states are forced).
    pub fn behavior_keys(&self) -> Vec<BehaviorKey> {
        let forced = self.wins_needed - 1;
        let mut keys = Vec::new();
        for round in 1..self.final_round() {
            let prior = round as usize - 1;
            let Some(mission) = self.mission(round) else {
                continue;
            };
            let max_on_team = self
                .teams_for(round)
                .map(|teams| teams.iter().map(|t| t.size()).max().unwrap_or(0))
                .unwrap_or(0)
                .min(self.spies);
            for spies in mission.fail_threshold..=max_on_team {
                for successes in 0..=prior {
                    let fails = prior - successes;
                    if successes >= forced || fails >= forced {
                        continue;
                    }
                    keys.push(BehaviorKey::new(round, spies as u8, successes as u8));
                }
            }
        }
        keys
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::seven_player()
    }
}

fn menu_from_seats(menu: &[&[usize]]) -> Vec<Team> {
    menu.iter()
        .filter_map(|seats| Team::from_seats(seats))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{players} players exceeds the supported maximum of {max}")]
    TooManyPlayers { players: usize, max: usize },
    #[error("spy count {spies} exceeds player count {players}")]
    SpiesExceedPlayers { spies: usize, players: usize },
    #[error("missions needed to win must be at least 1")]
    ZeroWinsNeeded,
    #[error("at least one mission round is required")]
    NoRounds,
    #[error("{0} rounds exceeds the supported maximum of 255")]
    TooManyRounds(usize),
    #[error("round {round}: team size {size} is outside 1..={players}")]
    TeamSize {
        round: usize,
        size: usize,
        players: usize,
    },
    #[error("round {round}: fail threshold must be at least 1")]
    ZeroFailThreshold { round: usize },
    #[error("round {round}: team menu is empty")]
    EmptyMenu { round: usize },
    #[error("round {round}: menu team {team} does not have {size} seats")]
    MenuTeamSize {
        round: usize,
        team: String,
        size: usize,
    },
    #[error("round {round}: menu team {team} seats a player outside 0..{players}")]
    MenuSeat {
        round: usize,
        team: String,
        players: usize,
    },
}

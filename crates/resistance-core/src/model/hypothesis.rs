use super::team::{MAX_SEATS, Team};
use crate::game::config::ConfigError;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One complete assignment of roles; bit `i` of the mask marks seat `i` as a spy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hypothesis {
    spies: u16,
    players: u8,
}

impl Hypothesis {
    /// Builds a hypothesis from per-seat role flags (`true` = spy).
    pub fn from_roles(roles: &[bool]) -> Option<Self> {
        if roles.len() > MAX_SEATS {
            return None;
        }
        let spies = roles
            .iter()
            .enumerate()
            .filter(|(_, spy)| **spy)
            .fold(0u16, |mask, (seat, _)| mask | (1 << seat));
        Some(Self {
            spies,
            players: roles.len() as u8,
        })
    }

    /// Seats at or beyond `players` are cleared from `mask`.
    pub const fn from_mask(mask: u16, players: usize) -> Self {
        let players = if players > MAX_SEATS {
            MAX_SEATS
        } else {
            players
        };
        let keep = if players == MAX_SEATS {
            u16::MAX
        } else {
            (1u16 << players) - 1
        };
        Self {
            spies: mask & keep,
            players: players as u8,
        }
    }

    pub const fn mask(self) -> u16 {
        self.spies
    }

    pub const fn player_count(self) -> usize {
        self.players as usize
    }

    pub const fn spy_count(self) -> usize {
        self.spies.count_ones() as usize
    }

    pub const fn is_spy(self, seat: usize) -> bool {
        seat < self.players as usize && self.spies & (1 << seat) != 0
    }

    pub fn roles(self) -> impl Iterator<Item = bool> {
        (0..self.player_count()).map(move |seat| self.is_spy(seat))
    }

    /// Number of spies this hypothesis places on `team`.
    pub const fn spies_on(self, team: Team) -> usize {
        (self.spies & team.mask()).count_ones() as usize
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for spy in self.roles() {
            f.write_str(if spy { "R" } else { "B" })?;
        }
        Ok(())
    }
}

/// All hypotheses with a fixed spy count, in ascending mask order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypothesisSpace {
    players: usize,
    spies: usize,
    hypotheses: Arc<[Hypothesis]>,
}

impl HypothesisSpace {
    pub fn enumerate(players: usize, spies: usize) -> Result<Self, ConfigError> {
        if players > MAX_SEATS {
            return Err(ConfigError::TooManyPlayers {
                players,
                max: MAX_SEATS,
            });
        }
        if spies > players {
            return Err(ConfigError::SpiesExceedPlayers { spies, players });
        }
        Ok(Self::build(players, spies))
    }

    /// Enumerates without validation; callers guarantee `spies <= players <= MAX_SEATS`.
    pub(crate) fn build(players: usize, spies: usize) -> Self {
        let hypotheses: Vec<Hypothesis> = (0u32..(1u32 << players))
            .filter(|mask| mask.count_ones() as usize == spies)
            .map(|mask| Hypothesis::from_mask(mask as u16, players))
            .collect();

        Self {
            players,
            spies,
            hypotheses: hypotheses.into(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players
    }

    pub fn spy_count(&self) -> usize {
        self.spies
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    pub fn as_slice(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hypothesis> {
        self.hypotheses.iter()
    }

    pub fn position(&self, hypothesis: &Hypothesis) -> Option<usize> {
        self.hypotheses.binary_search(hypothesis).ok()
    }

    pub(crate) fn shared(&self) -> Arc<[Hypothesis]> {
        Arc::clone(&self.hypotheses)
    }
}

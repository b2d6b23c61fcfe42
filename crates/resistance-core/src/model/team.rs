use core::fmt;
use serde::{Deserialize, Serialize};

/// Upper bound on seats representable in a role or team mask.
pub const MAX_SEATS: usize = 16;

/// Subset of seats sent on a mission, stored as a seat bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Team {
    members: u16,
}

impl Team {
    pub const EMPTY: Team = Team { members: 0 };

    pub const fn from_mask(members: u16) -> Self {
        Self { members }
    }

    /// Builds a team from seat indices; `None` when a seat does not fit the mask.
    pub fn from_seats(seats: &[usize]) -> Option<Self> {
        let mut members = 0u16;
        for &seat in seats {
            if seat >= MAX_SEATS {
                return None;
            }
            members |= 1 << seat;
        }
        Some(Self { members })
    }

    pub const fn mask(self) -> u16 {
        self.members
    }

    pub const fn size(self) -> usize {
        self.members.count_ones() as usize
    }

    pub const fn contains(self, seat: usize) -> bool {
        seat < MAX_SEATS && self.members & (1 << seat) != 0
    }

    pub fn seats(self) -> impl Iterator<Item = usize> {
        (0..MAX_SEATS).filter(move |seat| self.contains(*seat))
    }

    /// Highest seat index on the team plus one, or zero for the empty team.
    pub const fn seat_span(self) -> usize {
        MAX_SEATS - self.members.leading_zeros() as usize
    }

    /// Every team of exactly `size` seats drawn from `players`, in ascending mask order.
    pub fn all_of_size(players: usize, size: usize) -> Vec<Team> {
        let players = players.min(MAX_SEATS);
        (0u32..(1u32 << players))
            .filter(|mask| mask.count_ones() as usize == size)
            .map(|mask| Team::from_mask(mask as u16))
            .collect()
    }
}

impl TryFrom<Vec<usize>> for Team {
    type Error = String;

    fn try_from(seats: Vec<usize>) -> Result<Self, Self::Error> {
        Team::from_seats(&seats)
            .ok_or_else(|| format!("team seats must be below {MAX_SEATS}: {seats:?}"))
    }
}

impl From<Team> for Vec<usize> {
    fn from(team: Team) -> Self {
        team.seats().collect()
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, seat) in self.seats().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{seat}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seats_roundtrip_through_mask() {
        let team = Team::from_seats(&[0, 2, 3]).unwrap();
        assert_eq!(team.mask(), 0b1101);
        assert_eq!(team.size(), 3);
        assert_eq!(team.seats().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(team.seat_span(), 4);
        assert_eq!(team.to_string(), "[0,2,3]");
    }

    #[test]
    fn rejects_out_of_range_seat() {
        assert!(Team::from_seats(&[3, 16]).is_none());
    }

    #[test]
    fn all_of_size_counts_binomial() {
        assert_eq!(Team::all_of_size(7, 2).len(), 21);
        assert_eq!(Team::all_of_size(7, 3).len(), 35);
        assert_eq!(Team::all_of_size(7, 4).len(), 35);
        let pairs = Team::all_of_size(7, 2);
        assert_eq!(pairs[0], Team::from_seats(&[0, 1]).unwrap());
        assert!(pairs.windows(2).all(|w| w[0].mask() < w[1].mask()));
    }

    #[test]
    fn deserializes_from_seat_list() {
        let team: Team = serde_json::from_str("[3, 4, 5]").unwrap();
        assert_eq!(team, Team::from_seats(&[3, 4, 5]).unwrap());
        assert_eq!(serde_json::to_string(&team).unwrap(), "[3,4,5]");
        assert!(serde_json::from_str::<Team>("[1, 40]").is_err());
    }
}

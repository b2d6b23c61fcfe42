pub mod hypothesis;
pub mod outcome;
pub mod team;

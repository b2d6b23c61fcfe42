//! Posterior tracking over role hypotheses.
//!
//! - `state`: the [`BeliefState`] distribution and its Bayesian update.
//! - `cache`: memoization keyed by exact belief contents.
//! - `snapshot`: JSON-friendly captures for reporting.
//! - `telemetry`: summary metrics (entropy, support, leading hypothesis).

mod cache;
mod state;
pub mod snapshot;
pub mod telemetry;

pub use cache::{BeliefCacheKey, CacheStats, ValueCache};
pub use state::{BeliefError, BeliefState, DEGENERATE_MASS};

//! Economy: player statistics and WB token accrual.
//!
//! # Invariants
//! - Land count, token rate and rank are derived from the tile set.
//! - Token accrual is proportional to real elapsed time, independent of how
//!   often it is sampled.

mod accrual;
mod stats;

pub use accrual::TokenAccrual;
pub use stats::{PlayerStats, rank_of};

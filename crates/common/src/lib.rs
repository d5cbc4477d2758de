//! Shared value types used across the world builder crates.
//!
//! # Invariants
//! - Addresses are always stored in normalized lowercase form.
//! - Amounts are integral wei; ether strings are only a presentation format.

pub mod types;

pub use types::{Address, AddressError, AmountError, TileCoord, TxHash, Wei, WEI_PER_ETHER};

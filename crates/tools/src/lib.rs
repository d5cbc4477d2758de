//! Developer Tooling: world inspector, tile info, ASCII map.
//!
//! # Invariants
//! - Read-only: nothing here mutates a [`World`](worldbuilder_kernel::World).

pub mod inspector;
pub mod map;

pub use inspector::{OwnerHolding, TileInfo, WorldInspector, WorldSummary};
pub use map::render_map;

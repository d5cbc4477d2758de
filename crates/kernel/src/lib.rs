//! World Kernel: the tile grid, its building catalog, and every mutation to it.
//!
//! # Invariants
//! - Exactly one tile per (x, y); tile identity is positional and never reassigned.
//! - Grid generation is a pure function of the coordinates.
//! - A tile's yield rates always match the catalog entry for its building.
//! - All state mutations flow through explicit operations and are logged.

pub mod building;
pub mod world;

pub use building::{Building, BuildingCatalog, BuildingSpec, UnknownBuilding};
pub use world::{INCOME_PERIOD_MS, Tile, WORLD_SIZE, World, WorldError, WorldEvent, generate_tile};

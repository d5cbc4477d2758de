use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use worldbuilder_common::{Address, TileCoord, Wei};
use worldbuilder_economy::rank_of;
use worldbuilder_kernel::{Building, WORLD_SIZE, World};

/// World inspector for developer tooling.
///
/// Read-only queries against the world state for debugging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the world state.
    pub fn summary(world: &World) -> WorldSummary {
        let mut buildings = BTreeMap::new();
        for tile in world.tiles().iter().filter(|t| !t.building.is_empty()) {
            *buildings.entry(tile.building).or_insert(0) += 1;
        }
        let owners = Self::leaderboard(world, usize::MAX).len();
        WorldSummary {
            size: WORLD_SIZE,
            tiles: world.tiles().len(),
            owned: world.owned_count(),
            built: world.built_count(),
            owners,
            buildings,
            events: world.events().len(),
            state_hash: world.state_hash(),
        }
    }

    /// Details of a single tile, or `None` when out of bounds.
    pub fn inspect_tile(world: &World, coord: TileCoord) -> Option<TileInfo> {
        world.tile(coord).map(|t| TileInfo {
            coord: t.coord,
            owner: t.owner.clone(),
            building: t.building,
            income: t.income,
            wb_income: t.wb_income,
            last_harvest_ms: t.last_harvest_ms,
        })
    }

    /// Owners ordered by tile count (most first), ties broken by address.
    pub fn leaderboard(world: &World, limit: usize) -> Vec<OwnerHolding> {
        let mut counts: BTreeMap<&Address, u32> = BTreeMap::new();
        for owner in world.tiles().iter().filter_map(|t| t.owner.as_ref()) {
            *counts.entry(owner).or_insert(0) += 1;
        }
        let mut holdings: Vec<OwnerHolding> = counts
            .into_iter()
            .map(|(owner, tiles)| OwnerHolding {
                owner: owner.clone(),
                tiles,
                rank: rank_of(world, owner),
            })
            .collect();
        holdings.sort_by(|a, b| b.tiles.cmp(&a.tiles).then_with(|| a.owner.cmp(&b.owner)));
        holdings.truncate(limit);
        holdings
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    pub size: u32,
    pub tiles: usize,
    pub owned: usize,
    pub built: usize,
    pub owners: usize,
    pub buildings: BTreeMap<Building, usize>,
    pub events: usize,
    pub state_hash: u64,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: {size}x{size} tiles={} owned={} built={} owners={} events={} hash={:016x}",
            self.tiles,
            self.owned,
            self.built,
            self.owners,
            self.events,
            self.state_hash,
            size = self.size,
        )
    }
}

/// Detailed info about a single tile.
#[derive(Debug, Clone, Serialize)]
pub struct TileInfo {
    pub coord: TileCoord,
    pub owner: Option<Address>,
    pub building: Building,
    pub income: Wei,
    pub wb_income: f64,
    pub last_harvest_ms: u64,
}

impl fmt::Display for TileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self
            .owner
            .as_ref()
            .map_or_else(|| "unowned".to_string(), Address::short);
        write!(
            f,
            "Tile [{}] owner={owner} building={} income={} ETH wb={:.3}/s",
            self.coord, self.building, self.income, self.wb_income
        )
    }
}

/// One owner's share of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerHolding {
    pub owner: Address,
    pub tiles: u32,
    pub rank: u32,
}

use serde::{Deserialize, Serialize};
use worldbuilder_common::{Address, TileCoord, Wei};

use crate::building::{Building, BuildingCatalog};

/// Side length of the square world grid.
pub const WORLD_SIZE: u32 = 20;

/// Length of one income period: a building's `income` accrues per hour.
pub const INCOME_PERIOD_MS: u64 = 60 * 60 * 1000;

/// Errors from world mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("tile {0} is outside the world grid")]
    OutOfBounds(TileCoord),
    #[error("tile {0} is already owned")]
    AlreadyOwned(TileCoord),
    #[error("tile {0} is not owned by the acting account")]
    NotOwner(TileCoord),
    #[error("tile {0} already has a building")]
    AlreadyBuilt(TileCoord),
    #[error("cannot construct an empty building")]
    EmptyBuilding,
    #[error("tile {0} has no building to harvest")]
    NothingToHarvest(TileCoord),
}

/// A single grid cell: the unit of ownership and construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: TileCoord,
    pub owner: Option<Address>,
    pub building: Building,
    /// Income per [`INCOME_PERIOD_MS`].
    pub income: Wei,
    pub wb_income: f64,
    /// Unix milliseconds of the last harvest (or of generation).
    pub last_harvest_ms: u64,
}

impl Tile {
    pub fn id(&self) -> String {
        self.coord.id()
    }

    pub fn is_owned_by(&self, account: &Address) -> bool {
        self.owner.as_ref() == Some(account)
    }
}

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    LandPurchased {
        coord: TileCoord,
        owner: Address,
    },
    BuildingPlaced {
        coord: TileCoord,
        building: Building,
        at_ms: u64,
    },
    Harvested {
        coord: TileCoord,
        owner: Address,
        amount: Wei,
        at_ms: u64,
    },
}

/// Deterministic initial state of one tile.
///
/// `seed = x * WORLD_SIZE + y`; a tile is pre-owned when `seed * 7 % 10 == 0`
/// and carries a house when `seed * 3 % 20 == 0`. The owner is a synthetic
/// address derived from the seed.
pub fn generate_tile(coord: TileCoord, catalog: &BuildingCatalog, generated_at_ms: u64) -> Tile {
    let seed = u64::from(coord.x) * u64::from(WORLD_SIZE) + u64::from(coord.y);
    let owned = (seed * 7) % 10 == 0;
    let has_building = (seed * 3) % 20 == 0;

    let building = if has_building {
        Building::House
    } else {
        Building::Empty
    };
    let (income, wb_income) = catalog.yields(building);
    Tile {
        coord,
        owner: owned.then(|| Address::from_low_u64(seed)),
        building,
        income,
        wb_income,
        last_harvest_ms: generated_at_ms,
    }
}

/// The local world state: a fixed grid of tiles plus the log of every change.
///
/// Tiles are stored x-major (`index = x * WORLD_SIZE + y`), which is also the
/// canonical iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    tiles: Vec<Tile>,
    catalog: BuildingCatalog,
    generated_at_ms: u64,
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self::generate(BuildingCatalog::default(), 0)
    }
}

impl World {
    /// Generate the full grid.
    pub fn generate(catalog: BuildingCatalog, generated_at_ms: u64) -> Self {
        let tiles = (0..WORLD_SIZE)
            .flat_map(|x| (0..WORLD_SIZE).map(move |y| TileCoord::new(x, y)))
            .map(|coord| generate_tile(coord, &catalog, generated_at_ms))
            .collect();
        Self {
            tiles,
            catalog,
            generated_at_ms,
            event_log: Vec::new(),
        }
    }

    pub fn in_bounds(coord: TileCoord) -> bool {
        coord.x < WORLD_SIZE && coord.y < WORLD_SIZE
    }

    fn index(coord: TileCoord) -> Result<usize, WorldError> {
        if !Self::in_bounds(coord) {
            return Err(WorldError::OutOfBounds(coord));
        }
        Ok((coord.x * WORLD_SIZE + coord.y) as usize)
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn generated_at_ms(&self) -> u64 {
        self.generated_at_ms
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        Self::index(coord).ok().map(|i| &self.tiles[i])
    }

    fn tile_mut(&mut self, coord: TileCoord) -> Result<&mut Tile, WorldError> {
        let i = Self::index(coord)?;
        Ok(&mut self.tiles[i])
    }

    /// All tiles in canonical (x-major) order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tiles_owned_by<'a>(&'a self, account: &'a Address) -> impl Iterator<Item = &'a Tile> {
        self.tiles.iter().filter(move |t| t.is_owned_by(account))
    }

    pub fn owned_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.owner.is_some()).count()
    }

    pub fn built_count(&self) -> usize {
        self.tiles.iter().filter(|t| !t.building.is_empty()).count()
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Assign an unowned tile to `owner`.
    pub fn purchase_land(&mut self, coord: TileCoord, owner: &Address) -> Result<(), WorldError> {
        let tile = self.tile_mut(coord)?;
        if tile.owner.is_some() {
            return Err(WorldError::AlreadyOwned(coord));
        }
        tile.owner = Some(owner.clone());
        tracing::info!(tile = %coord, owner = %owner.short(), "land purchased");
        self.event_log.push(WorldEvent::LandPurchased {
            coord,
            owner: owner.clone(),
        });
        Ok(())
    }

    /// Construct `building` on an empty tile owned by `owner`, taking its
    /// yields from the catalog. Income starts accruing at `now_ms`.
    pub fn place_building(
        &mut self,
        coord: TileCoord,
        owner: &Address,
        building: Building,
        now_ms: u64,
    ) -> Result<(), WorldError> {
        if building.is_empty() {
            return Err(WorldError::EmptyBuilding);
        }
        let (income, wb_income) = self.catalog.yields(building);
        let tile = self.tile_mut(coord)?;
        if !tile.is_owned_by(owner) {
            return Err(WorldError::NotOwner(coord));
        }
        if !tile.building.is_empty() {
            return Err(WorldError::AlreadyBuilt(coord));
        }
        tile.building = building;
        tile.income = income;
        tile.wb_income = wb_income;
        tile.last_harvest_ms = now_ms;
        tracing::info!(tile = %coord, %building, "building placed");
        self.event_log.push(WorldEvent::BuildingPlaced {
            coord,
            building,
            at_ms: now_ms,
        });
        Ok(())
    }

    /// Collect income accrued on a tile since its last harvest.
    ///
    /// Income is pro-rated per millisecond of [`INCOME_PERIOD_MS`]. A clock
    /// that went backwards yields nothing but still resets the harvest mark.
    pub fn harvest(
        &mut self,
        coord: TileCoord,
        owner: &Address,
        now_ms: u64,
    ) -> Result<Wei, WorldError> {
        let tile = self.tile_mut(coord)?;
        if !tile.is_owned_by(owner) {
            return Err(WorldError::NotOwner(coord));
        }
        if tile.building.is_empty() {
            return Err(WorldError::NothingToHarvest(coord));
        }
        let elapsed = now_ms.saturating_sub(tile.last_harvest_ms);
        let amount = tile
            .income
            .scaled(u128::from(elapsed), u128::from(INCOME_PERIOD_MS));
        tile.last_harvest_ms = now_ms;
        tracing::debug!(tile = %coord, %amount, elapsed_ms = elapsed, "harvested");
        self.event_log.push(WorldEvent::Harvested {
            coord,
            owner: owner.clone(),
            amount,
            at_ms: now_ms,
        });
        Ok(amount)
    }

    /// Rebuild a world by applying `events` over a freshly generated grid.
    ///
    /// Events that no longer apply (for example a purchase of a tile that is
    /// already owned) are skipped.
    pub fn replay(catalog: BuildingCatalog, generated_at_ms: u64, events: &[WorldEvent]) -> Self {
        let mut world = Self::generate(catalog, generated_at_ms);
        for event in events {
            let applied = match event {
                WorldEvent::LandPurchased { coord, owner } => world.purchase_land(*coord, owner),
                WorldEvent::BuildingPlaced {
                    coord,
                    building,
                    at_ms,
                } => match world.tile(*coord).and_then(|t| t.owner.clone()) {
                    Some(owner) => world.place_building(*coord, &owner, *building, *at_ms),
                    None => Err(WorldError::NotOwner(*coord)),
                },
                WorldEvent::Harvested {
                    coord, owner, at_ms, ..
                } => world.harvest(*coord, owner, *at_ms).map(|_| ()),
            };
            if let Err(e) = applied {
                tracing::warn!(error = %e, "skipping event during replay");
            }
        }
        world
    }

    /// Deterministic FNV-1a hash of every tile, in canonical order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        for tile in &self.tiles {
            mix(&mut h, &tile.coord.x.to_le_bytes());
            mix(&mut h, &tile.coord.y.to_le_bytes());
            match &tile.owner {
                Some(owner) => mix(&mut h, owner.as_str().as_bytes()),
                None => mix(&mut h, &[0]),
            }
            mix(&mut h, tile.building.name().as_bytes());
            mix(&mut h, &tile.income.as_u128().to_le_bytes());
            mix(&mut h, &tile.wb_income.to_le_bytes());
            mix(&mut h, &tile.last_harvest_ms.to_le_bytes());
        }
        h
    }
}

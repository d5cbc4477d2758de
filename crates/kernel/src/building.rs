use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use worldbuilder_common::{WEI_PER_ETHER, Wei};

/// One thousandth of an ether.
const FINNEY: u128 = WEI_PER_ETHER / 1_000;

/// A structure that can stand on a tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Building {
    #[default]
    Empty,
    House,
    Shop,
    Attraction,
    Factory,
    Headquarters,
}

impl Building {
    /// Every kind that can actually be constructed, cheapest first.
    pub const CONSTRUCTIBLE: [Building; 5] = [
        Building::House,
        Building::Shop,
        Building::Attraction,
        Building::Factory,
        Building::Headquarters,
    ];

    pub fn is_empty(self) -> bool {
        self == Building::Empty
    }

    pub fn name(self) -> &'static str {
        match self {
            Building::Empty => "empty",
            Building::House => "house",
            Building::Shop => "shop",
            Building::Attraction => "attraction",
            Building::Factory => "factory",
            Building::Headquarters => "headquarters",
        }
    }

    /// Single-character glyph used by map renderers.
    pub fn glyph(self) -> char {
        match self {
            Building::Empty => ' ',
            Building::House => 'h',
            Building::Shop => 's',
            Building::Attraction => 'a',
            Building::Factory => 'f',
            Building::Headquarters => 'q',
        }
    }
}

impl fmt::Display for Building {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown building kind {0:?}")]
pub struct UnknownBuilding(pub String);

impl FromStr for Building {
    type Err = UnknownBuilding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Building::Empty),
            "house" => Ok(Building::House),
            "shop" => Ok(Building::Shop),
            "attraction" => Ok(Building::Attraction),
            "factory" => Ok(Building::Factory),
            "headquarters" | "hq" => Ok(Building::Headquarters),
            _ => Err(UnknownBuilding(s.to_string())),
        }
    }
}

/// Price and yield of one building kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    /// Cost to construct, paid as a value transfer.
    pub price: Wei,
    /// Income credited per income period on harvest.
    pub income: Wei,
    /// WB tokens streamed per second while the building stands.
    pub wb_per_second: f64,
}

impl BuildingSpec {
    const fn finney(price: u128, income: u128, wb_per_second: f64) -> Self {
        Self {
            price: Wei::new(price * FINNEY),
            income: Wei::new(income * FINNEY),
            wb_per_second,
        }
    }
}

/// Static table of constructible buildings.
///
/// Defaults mirror the live pricing; any entry can be overridden from
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingCatalog {
    pub house: BuildingSpec,
    pub shop: BuildingSpec,
    pub attraction: BuildingSpec,
    pub factory: BuildingSpec,
    pub headquarters: BuildingSpec,
}

impl Default for BuildingCatalog {
    fn default() -> Self {
        Self {
            house: BuildingSpec::finney(5, 10, 1.0),
            shop: BuildingSpec::finney(20, 30, 3.0),
            attraction: BuildingSpec::finney(50, 100, 10.0),
            factory: BuildingSpec::finney(100, 200, 20.0),
            headquarters: BuildingSpec::finney(250, 500, 50.0),
        }
    }
}

impl BuildingCatalog {
    /// Spec for a building kind; `None` for [`Building::Empty`].
    pub fn spec(&self, building: Building) -> Option<&BuildingSpec> {
        match building {
            Building::Empty => None,
            Building::House => Some(&self.house),
            Building::Shop => Some(&self.shop),
            Building::Attraction => Some(&self.attraction),
            Building::Factory => Some(&self.factory),
            Building::Headquarters => Some(&self.headquarters),
        }
    }

    pub fn price(&self, building: Building) -> Option<Wei> {
        self.spec(building).map(|s| s.price)
    }

    /// `(income, wb_per_second)` for a building; zero for empty land.
    pub fn yields(&self, building: Building) -> (Wei, f64) {
        self.spec(building)
            .map(|s| (s.income, s.wb_per_second))
            .unwrap_or((Wei::ZERO, 0.0))
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;
use worldbuilder_common::{Address, Wei};
use worldbuilder_kernel::{Building, BuildingCatalog};

/// Receiving address for all land and building payments.
const TREASURY: [u8; 20] = [
    0xf1, 0xfa, 0x20, 0x02, 0x7b, 0x62, 0x02, 0xbc, 0x18, 0xe4, 0x45, 0x41, 0x49, 0xc8, 0x5c, 0xb0,
    0x1d, 0xc9, 0x1d, 0xfd,
];

/// 0.000001 ETH.
const LAND_PRICE_WEI: u128 = 1_000_000_000_000;

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which of the player's accounts pays for actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingSource {
    /// The app-scoped sub-account that also owns tiles.
    #[default]
    Sub,
    /// The wallet's primary funding account.
    Universal,
}

/// Pricing, treasury and funding defaults for a session.
///
/// Every field is optional in YAML; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBuilderConfig {
    pub treasury: Address,
    pub land_price: Wei,
    pub buildings: BuildingCatalog,
    pub funding: FundingSource,
}

impl Default for WorldBuilderConfig {
    fn default() -> Self {
        Self {
            treasury: Address::from_bytes(TREASURY),
            land_price: Wei::new(LAND_PRICE_WEI),
            buildings: BuildingCatalog::default(),
            funding: FundingSource::default(),
        }
    }
}

impl WorldBuilderConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Every price must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.land_price.is_zero() {
            return Err(ConfigError::Invalid("land_price must be greater than zero".into()));
        }
        for building in Building::CONSTRUCTIBLE {
            if self.buildings.price(building).is_none_or(Wei::is_zero) {
                return Err(ConfigError::Invalid(format!(
                    "price for {building} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

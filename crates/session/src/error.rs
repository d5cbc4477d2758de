use worldbuilder_common::{TileCoord, Wei};
use worldbuilder_kernel::WorldError;
use worldbuilder_wallet::WalletError;

/// Why a player action was refused. None of these are fatal: the action is
/// dropped and the world is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("no valid tile selected")]
    InvalidSelection,
    #[error("no wallet account connected")]
    NotConnected,
    #[error("another transaction is still pending")]
    ActionPending,
    #[error("tile {0} is already owned by another player")]
    AlreadyOwned(TileCoord),
    #[error("you can only build on land you own (tile {0})")]
    NotOwner(TileCoord),
    #[error("tile {0} already has a building")]
    AlreadyBuilt(TileCoord),
    #[error("choose a building to construct")]
    NoBuildingChosen,
    #[error("enter an amount greater than zero")]
    InvalidAmount,
    #[error("tile {0} has no building to harvest")]
    NothingToHarvest(TileCoord),
    #[error("you need at least {required} ETH, have {available} ETH")]
    InsufficientBalance { required: Wei, available: Wei },
    #[error("the transaction was rejected or failed: {0}")]
    TransactionRejected(String),
    #[error("receipt does not match the pending action: {0}")]
    ReceiptMismatch(String),
    #[error(transparent)]
    Wallet(WalletError),
}

impl ActionError {
    /// Short heading for the user-facing notice.
    pub fn title(&self) -> &'static str {
        match self {
            ActionError::InvalidSelection => "No tile selected",
            ActionError::NotConnected => "Wallet not connected",
            ActionError::ActionPending => "Transaction in progress",
            ActionError::AlreadyOwned(_) => "Land already owned",
            ActionError::NotOwner(_) => "Not your land",
            ActionError::AlreadyBuilt(_) => "Land occupied",
            ActionError::NoBuildingChosen => "No building chosen",
            ActionError::InvalidAmount => "Invalid amount",
            ActionError::NothingToHarvest(_) => "Nothing to harvest",
            ActionError::InsufficientBalance { .. } => "Insufficient balance",
            ActionError::TransactionRejected(_) => "Transaction failed",
            ActionError::ReceiptMismatch(_) => "Transaction not recognized",
            ActionError::Wallet(_) => "Wallet error",
        }
    }
}

impl From<WalletError> for ActionError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Rejected(reason) => ActionError::TransactionRejected(reason),
            other => ActionError::Wallet(other),
        }
    }
}

impl From<WorldError> for ActionError {
    fn from(e: WorldError) -> Self {
        match e {
            WorldError::OutOfBounds(_) => ActionError::InvalidSelection,
            WorldError::AlreadyOwned(c) => ActionError::AlreadyOwned(c),
            WorldError::NotOwner(c) => ActionError::NotOwner(c),
            WorldError::AlreadyBuilt(c) => ActionError::AlreadyBuilt(c),
            WorldError::EmptyBuilding => ActionError::NoBuildingChosen,
            WorldError::NothingToHarvest(c) => ActionError::NothingToHarvest(c),
        }
    }
}

//! Binding between a submitted transaction and the action that caused it.
//!
//! Each purchase or build gets a fresh intent id and a tag derived from it.
//! The tag travels with the transfer; on confirmation the receipt must echo
//! the tag and match the expected sender, recipient and value before the
//! action is applied.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;
use worldbuilder_common::{Address, TileCoord, TxHash, Wei};
use worldbuilder_kernel::Building;
use worldbuilder_wallet::Receipt;

use crate::error::ActionError;

/// What a pending transaction pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntentAction {
    PurchaseLand,
    Build(Building),
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentAction::PurchaseLand => f.write_str("land"),
            IntentAction::Build(b) => write!(f, "build:{b}"),
        }
    }
}

/// Tag carried by the transfer: the first 16 bytes of
/// `sha256(intent id || action || tile id)`, hex encoded.
pub fn intent_tag(id: &Uuid, action: IntentAction, coord: TileCoord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(action.to_string().as_bytes());
    hasher.update(coord.id().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// A purchase or build awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingIntent {
    pub id: Uuid,
    pub tag: String,
    pub action: IntentAction,
    pub coord: TileCoord,
    pub price: Wei,
    /// Account the transfer was sent from.
    pub payer: Address,
    /// Account that will own the result.
    pub beneficiary: Address,
    pub tx: TxHash,
}

impl PendingIntent {
    /// Check that `receipt` is the settlement of exactly this intent.
    pub fn verify(&self, receipt: &Receipt, treasury: &Address) -> Result<(), ActionError> {
        let mismatch = |what: String| Err(ActionError::ReceiptMismatch(what));
        if receipt.hash != self.tx {
            return mismatch(format!("hash {} != {}", receipt.hash, self.tx));
        }
        if &receipt.to != treasury {
            return mismatch(format!("recipient {} is not the treasury", receipt.to));
        }
        if receipt.from != self.payer {
            return mismatch(format!("sender {} is not {}", receipt.from, self.payer));
        }
        if receipt.value != self.price {
            return mismatch(format!("value {} ETH != price {} ETH", receipt.value, self.price));
        }
        if receipt.tag.as_deref() != Some(self.tag.as_str()) {
            return mismatch("intent tag missing or different".to_string());
        }
        Ok(())
    }
}

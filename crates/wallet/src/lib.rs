//! Wallet capability consumed by the world builder session.
//!
//! The session never talks to a wallet provider directly; it sees balances,
//! submits value transfers, and polls each transaction's lifecycle
//! (`pending → confirmed | failed`) through the [`Wallet`] trait.
//!
//! # Invariants
//! - A transaction handle is only ever resolved once: confirmed or failed.
//! - A receipt reports what the chain actually did, not what was requested.

mod memory;

pub use memory::InMemoryWallet;

use serde::{Deserialize, Serialize};
use worldbuilder_common::{Address, TxHash, Wei};

/// Errors surfaced by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// A plain value transfer, optionally carrying an opaque tag in its calldata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub value: Wei,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// What a confirmed transaction actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: Wei,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Lifecycle state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed(Receipt),
    Failed { reason: String },
}

impl TxStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, TxStatus::Pending)
    }
}

/// Balance queries, value transfers and transaction status.
pub trait Wallet {
    fn balance(&self, account: &Address) -> Result<Wei, WalletError>;

    /// Submit a transfer. `Err` means the wallet refused to submit (for
    /// example the user declined); `Ok` only means a transaction now exists.
    fn send_value_transfer(&mut self, request: TransferRequest) -> Result<TxHash, WalletError>;

    fn status(&self, hash: &TxHash) -> Result<TxStatus, WalletError>;
}

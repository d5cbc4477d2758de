use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use worldbuilder_common::{Address, TxHash, Wei};

use crate::{Receipt, TransferRequest, TxStatus, Wallet, WalletError};

#[derive(Debug, Clone)]
struct Submitted {
    request: TransferRequest,
    status: TxStatus,
}

/// In-memory ledger implementing [`Wallet`].
///
/// Transfers stay pending until [`confirm`](Self::confirm) or
/// [`fail`](Self::fail) is called, unless auto-confirm is on. Balances move
/// only on confirmation.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    balances: BTreeMap<Address, Wei>,
    txs: BTreeMap<TxHash, Submitted>,
    order: Vec<TxHash>,
    nonce: u64,
    auto_confirm: bool,
    reject_next: Option<String>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, account: &Address, amount: Wei) -> Self {
        self.set_balance(account, amount);
        self
    }

    pub fn with_auto_confirm(mut self, on: bool) -> Self {
        self.auto_confirm = on;
        self
    }

    pub fn set_balance(&mut self, account: &Address, amount: Wei) {
        self.balances.insert(account.clone(), amount);
    }

    /// Make the next submission fail as if the user declined it.
    pub fn reject_next(&mut self, reason: impl Into<String>) {
        self.reject_next = Some(reason.into());
    }

    /// Every transfer submitted so far, oldest first.
    pub fn submitted(&self) -> Vec<&TransferRequest> {
        self.order
            .iter()
            .filter_map(|h| self.txs.get(h))
            .map(|s| &s.request)
            .collect()
    }

    pub fn transfer_count(&self) -> usize {
        self.order.len()
    }

    pub fn pending(&self) -> Vec<TxHash> {
        self.order
            .iter()
            .filter(|h| self.txs.get(*h).is_some_and(|s| s.status.is_pending()))
            .cloned()
            .collect()
    }

    /// Settle a pending transaction exactly as requested.
    pub fn confirm(&mut self, hash: &TxHash) -> Result<Receipt, WalletError> {
        let request = self.pending_request(hash)?.clone();
        let receipt = Receipt {
            hash: hash.clone(),
            from: request.from,
            to: request.to,
            value: request.value,
            tag: request.tag,
        };
        self.settle(hash, receipt)
    }

    /// Settle a pending transaction with a receipt that may differ from the
    /// request, as a misbehaving provider or a replaced transaction would.
    pub fn confirm_with(&mut self, hash: &TxHash, receipt: Receipt) -> Result<Receipt, WalletError> {
        self.pending_request(hash)?;
        self.settle(hash, receipt)
    }

    pub fn fail(&mut self, hash: &TxHash, reason: impl Into<String>) -> Result<(), WalletError> {
        self.pending_request(hash)?;
        let reason = reason.into();
        tracing::debug!(%hash, %reason, "transaction failed");
        if let Some(s) = self.txs.get_mut(hash) {
            s.status = TxStatus::Failed { reason };
        }
        Ok(())
    }

    fn pending_request(&self, hash: &TxHash) -> Result<&TransferRequest, WalletError> {
        match self.txs.get(hash) {
            Some(s) if s.status.is_pending() => Ok(&s.request),
            Some(_) => Err(WalletError::Rejected(format!("{hash} already settled"))),
            None => Err(WalletError::UnknownTransaction(hash.clone())),
        }
    }

    fn settle(&mut self, hash: &TxHash, receipt: Receipt) -> Result<Receipt, WalletError> {
        let available = self.balances.get(&receipt.from).copied().unwrap_or_default();
        let Some(remaining) = available.checked_sub(receipt.value) else {
            let reason = format!("insufficient funds: have {available}, need {}", receipt.value);
            self.fail(hash, reason.clone())?;
            return Err(WalletError::Rejected(reason));
        };
        self.balances.insert(receipt.from.clone(), remaining);
        let credited = self.balances.entry(receipt.to.clone()).or_default();
        *credited = credited.saturating_add(receipt.value);

        tracing::debug!(%hash, value = %receipt.value, "transaction confirmed");
        if let Some(s) = self.txs.get_mut(hash) {
            s.status = TxStatus::Confirmed(receipt.clone());
        }
        Ok(receipt)
    }

    fn next_hash(&mut self, request: &TransferRequest) -> TxHash {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(request.from.as_str().as_bytes());
        hasher.update(request.to.as_str().as_bytes());
        hasher.update(request.value.as_u128().to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        TxHash(format!("0x{}", hex::encode(hasher.finalize())))
    }
}

impl Wallet for InMemoryWallet {
    fn balance(&self, account: &Address) -> Result<Wei, WalletError> {
        Ok(self.balances.get(account).copied().unwrap_or_default())
    }

    fn send_value_transfer(&mut self, request: TransferRequest) -> Result<TxHash, WalletError> {
        if let Some(reason) = self.reject_next.take() {
            tracing::debug!(%reason, "transfer declined");
            return Err(WalletError::Rejected(reason));
        }
        let hash = self.next_hash(&request);
        tracing::debug!(%hash, to = %request.to.short(), value = %request.value, "transfer submitted");
        self.txs.insert(
            hash.clone(),
            Submitted {
                request,
                status: TxStatus::Pending,
            },
        );
        self.order.push(hash.clone());
        if self.auto_confirm {
            // A settlement failure is recorded on the transaction itself.
            let _ = self.confirm(&hash);
        }
        Ok(hash)
    }

    fn status(&self, hash: &TxHash) -> Result<TxStatus, WalletError> {
        self.txs
            .get(hash)
            .map(|s| s.status.clone())
            .ok_or_else(|| WalletError::UnknownTransaction(hash.clone()))
    }
}

use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;
use worldbuilder_common::{Address, TileCoord, TxHash, Wei};
use worldbuilder_economy::{PlayerStats, TokenAccrual};
use worldbuilder_kernel::{Building, Tile, World};
use worldbuilder_wallet::{TransferRequest, TxStatus, Wallet, WalletError};

use crate::config::{FundingSource, WorldBuilderConfig};
use crate::error::ActionError;
use crate::intent::{IntentAction, PendingIntent, intent_tag};
use crate::notify::{Notice, NoticeKind, Notifier};
use crate::selection::Selection;

/// The player's identities as reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accounts {
    /// App-scoped account: signs transfers by default and owns tiles.
    pub sub: Address,
    /// Primary funding account, when the wallet exposes one.
    pub universal: Option<Address>,
}

impl Accounts {
    pub fn sub_only(sub: Address) -> Self {
        Self {
            sub,
            universal: None,
        }
    }
}

/// Result of checking on the in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing is in flight.
    Idle,
    /// The transaction has not settled yet.
    Pending,
    /// The transaction settled, matched its intent, and was applied.
    Applied {
        action: IntentAction,
        coord: TileCoord,
        tx: TxHash,
    },
}

/// One player's view of the world and everything they can do to it.
pub struct Session<W: Wallet, N: Notifier> {
    world: World,
    config: WorldBuilderConfig,
    wallet: W,
    notifier: N,
    accounts: Option<Accounts>,
    funding: FundingSource,
    selection: Selection,
    pending: Option<PendingIntent>,
    stats: PlayerStats,
    /// Account the current stats were accumulated for.
    stats_owner: Option<Address>,
    accrual: TokenAccrual,
    started: Instant,
    started_ms: u64,
}

impl<W: Wallet, N: Notifier> Session<W, N> {
    /// Start a session over a freshly generated world.
    ///
    /// `now_ms` is the wall-clock time of generation; later instants are
    /// mapped onto world time relative to it.
    pub fn new(config: WorldBuilderConfig, wallet: W, notifier: N, now_ms: u64) -> Self {
        let world = World::generate(config.buildings.clone(), now_ms);
        let funding = config.funding;
        Self {
            world,
            config,
            wallet,
            notifier,
            accounts: None,
            funding,
            selection: Selection::default(),
            pending: None,
            stats: PlayerStats::default(),
            stats_owner: None,
            accrual: TokenAccrual::new(),
            started: Instant::now(),
            started_ms: now_ms,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }

    /// World time, in unix milliseconds, at `now`.
    pub fn world_ms(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started).as_millis();
        self.started_ms
            .saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &WorldBuilderConfig {
        &self.config
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut W {
        &mut self.wallet
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn pending(&self) -> Option<&PendingIntent> {
        self.pending.as_ref()
    }

    /// Whether a purchase or build is waiting on its transaction.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn accounts(&self) -> Option<&Accounts> {
        self.accounts.as_ref()
    }

    pub fn funding(&self) -> FundingSource {
        self.funding
    }

    /// Attach the wallet's accounts. Stats are recomputed for the new owner;
    /// earnings and tokens start over when the account differs from the one
    /// they were accumulated for.
    pub fn connect(&mut self, accounts: Accounts) {
        tracing::debug!(sub = %accounts.sub.short(), "accounts connected");
        if self.stats_owner.as_ref() != Some(&accounts.sub) {
            self.stats = PlayerStats::default();
            self.accrual = TokenAccrual::new();
            self.stats_owner = Some(accounts.sub.clone());
        }
        self.stats.refresh(&self.world, &accounts.sub);
        if self.funding == FundingSource::Universal && accounts.universal.is_none() {
            self.funding = FundingSource::Sub;
        }
        self.accounts = Some(accounts);
    }

    /// Detach the accounts. A pending transaction is still tracked and will
    /// be applied for the account that started it. Token accrual stops at
    /// the last tick.
    pub fn disconnect(&mut self) {
        self.accounts = None;
        self.accrual = TokenAccrual::new();
    }

    fn sub_account(&self) -> Result<&Address, ActionError> {
        self.accounts
            .as_ref()
            .map(|a| &a.sub)
            .ok_or(ActionError::NotConnected)
    }

    /// Account that pays for actions under the current funding source.
    pub fn funding_account(&self) -> Result<&Address, ActionError> {
        let accounts = self.accounts.as_ref().ok_or(ActionError::NotConnected)?;
        match self.funding {
            FundingSource::Sub => Ok(&accounts.sub),
            FundingSource::Universal => accounts.universal.as_ref().ok_or(ActionError::NotConnected),
        }
    }

    pub fn set_funding(&mut self, source: FundingSource) -> Result<(), ActionError> {
        let previous = self.funding;
        self.funding = source;
        if let Err(e) = self.funding_account() {
            self.funding = previous;
            return self.report(Err(e));
        }
        tracing::debug!(?source, "funding source changed");
        Ok(())
    }

    /// Balance of the active funding account.
    pub fn active_balance(&self) -> Result<Wei, ActionError> {
        let account = self.funding_account()?;
        Ok(self.wallet.balance(account)?)
    }

    /// Select any in-bounds tile, owned or not.
    pub fn select(&mut self, coord: TileCoord) -> Result<(), ActionError> {
        if !World::in_bounds(coord) {
            return self.report(Err(ActionError::InvalidSelection));
        }
        tracing::debug!(tile = %coord, "tile selected");
        self.selection = Selection::TileSelected(coord);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::NoSelection;
    }

    pub fn selected_tile(&self) -> Option<&Tile> {
        self.selection.coord().and_then(|c| self.world.tile(c))
    }

    fn selected_coord(&self) -> Result<TileCoord, ActionError> {
        self.selection.coord().ok_or(ActionError::InvalidSelection)
    }

    /// Pay for the selected unowned tile.
    ///
    /// On success the transfer is in flight; the tile changes hands only
    /// once [`poll`](Self::poll) sees a matching confirmation.
    pub fn buy_land(&mut self) -> Result<TxHash, ActionError> {
        let result = self.try_buy_land();
        self.report(result)
    }

    fn try_buy_land(&mut self) -> Result<TxHash, ActionError> {
        self.sub_account()?;
        let coord = self.selected_coord()?;
        if self.pending.is_some() {
            return Err(ActionError::ActionPending);
        }
        let tile = self.world.tile(coord).ok_or(ActionError::InvalidSelection)?;
        if tile.owner.is_some() {
            return Err(ActionError::AlreadyOwned(coord));
        }
        let price = self.config.land_price;
        self.ensure_balance(price)?;
        let tx = self.submit(IntentAction::PurchaseLand, coord, price)?;
        self.notifier.notify(Notice::new(
            NoticeKind::Info,
            "Purchasing land...",
            format!("Buying tile ({}, {}) for {price} ETH", coord.x, coord.y),
        ));
        Ok(tx)
    }

    /// Pay to construct `building` on the selected tile.
    pub fn build(&mut self, building: Building) -> Result<TxHash, ActionError> {
        let result = self.try_build(building);
        self.report(result)
    }

    fn try_build(&mut self, building: Building) -> Result<TxHash, ActionError> {
        let owner = self.sub_account()?.clone();
        let coord = self.selected_coord()?;
        if self.pending.is_some() {
            return Err(ActionError::ActionPending);
        }
        let price = self
            .config
            .buildings
            .price(building)
            .ok_or(ActionError::NoBuildingChosen)?;
        let tile = self.world.tile(coord).ok_or(ActionError::InvalidSelection)?;
        if !tile.is_owned_by(&owner) {
            return Err(ActionError::NotOwner(coord));
        }
        if !tile.building.is_empty() {
            return Err(ActionError::AlreadyBuilt(coord));
        }
        self.ensure_balance(price)?;
        let tx = self.submit(IntentAction::Build(building), coord, price)?;
        self.notifier.notify(Notice::new(
            NoticeKind::Info,
            format!("Building {building}..."),
            format!(
                "Constructing {building} on tile ({}, {}) for {price} ETH",
                coord.x, coord.y
            ),
        ));
        Ok(tx)
    }

    fn ensure_balance(&self, required: Wei) -> Result<(), ActionError> {
        let available = self.active_balance()?;
        if available < required {
            return Err(ActionError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    fn submit(
        &mut self,
        action: IntentAction,
        coord: TileCoord,
        price: Wei,
    ) -> Result<TxHash, ActionError> {
        let payer = self.funding_account()?.clone();
        let beneficiary = self.sub_account()?.clone();
        let id = Uuid::new_v4();
        let tag = intent_tag(&id, action, coord);
        let request = TransferRequest {
            from: payer.clone(),
            to: self.config.treasury.clone(),
            value: price,
            tag: Some(tag.clone()),
        };
        let tx = self.wallet.send_value_transfer(request)?;
        tracing::debug!(%action, tile = %coord, %tx, %tag, "intent submitted");
        self.pending = Some(PendingIntent {
            id,
            tag,
            action,
            coord,
            price,
            payer,
            beneficiary,
            tx: tx.clone(),
        });
        Ok(tx)
    }

    /// Move value from the universal account to the sub-account.
    ///
    /// A plain transfer with no tile attached: it does not block or wait on
    /// purchases and builds.
    pub fn fund_sub_account(&mut self, amount: Wei) -> Result<TxHash, ActionError> {
        let result = self.try_fund_sub_account(amount);
        self.report(result)
    }

    fn try_fund_sub_account(&mut self, amount: Wei) -> Result<TxHash, ActionError> {
        let accounts = self.accounts.as_ref().ok_or(ActionError::NotConnected)?;
        let universal = accounts.universal.clone().ok_or(ActionError::NotConnected)?;
        let sub = accounts.sub.clone();
        if amount.is_zero() {
            return Err(ActionError::InvalidAmount);
        }
        let available = self.wallet.balance(&universal)?;
        if available < amount {
            return Err(ActionError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        let tx = self.wallet.send_value_transfer(TransferRequest {
            from: universal,
            to: sub,
            value: amount,
            tag: None,
        })?;
        tracing::debug!(%tx, %amount, "sub-account funding submitted");
        self.notifier.notify(Notice::new(
            NoticeKind::Success,
            "Transfer initiated!",
            format!("Sending {amount} ETH to Sub Account"),
        ));
        Ok(tx)
    }

    /// Check the in-flight transaction and apply it once it confirms.
    ///
    /// A failed transaction or a receipt that does not match the intent
    /// clears the intent and leaves the world unchanged. Tokens are accrued
    /// up to `now` at the old rate before a confirmed build changes it.
    pub fn poll(&mut self, now: Instant) -> Result<PollOutcome, ActionError> {
        let result = self.try_poll(now);
        self.report(result)
    }

    fn try_poll(&mut self, now: Instant) -> Result<PollOutcome, ActionError> {
        let Some(intent) = self.pending.as_ref() else {
            return Ok(PollOutcome::Idle);
        };
        let status = match self.wallet.status(&intent.tx) {
            Ok(status) => status,
            Err(e @ WalletError::UnknownTransaction(_)) => {
                self.pending = None;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let receipt = match status {
            TxStatus::Pending => return Ok(PollOutcome::Pending),
            TxStatus::Failed { reason } => {
                self.pending = None;
                return Err(ActionError::TransactionRejected(reason));
            }
            TxStatus::Confirmed(receipt) => receipt,
        };

        let Some(intent) = self.pending.take() else {
            return Ok(PollOutcome::Idle);
        };
        let _span = tracing::info_span!("confirm", tx = %intent.tx, tile = %intent.coord).entered();
        if let Err(e) = intent.verify(&receipt, &self.config.treasury) {
            tracing::warn!(error = %e, "receipt rejected");
            return Err(e);
        }

        let at_ms = self.world_ms(now);
        match intent.action {
            IntentAction::PurchaseLand => {
                self.world.purchase_land(intent.coord, &intent.beneficiary)?;
            }
            IntentAction::Build(building) => {
                self.world
                    .place_building(intent.coord, &intent.beneficiary, building, at_ms)?;
            }
        }
        if let Some(sub) = self.accounts.as_ref().map(|a| a.sub.clone()) {
            self.accrual.advance(&mut self.stats, now);
            self.stats.refresh(&self.world, &sub);
        }

        let detail = match intent.action {
            IntentAction::PurchaseLand => "Land purchased!".to_string(),
            IntentAction::Build(b) => format!("{b} constructed!"),
        };
        self.notifier
            .notify(Notice::new(NoticeKind::Success, "Transaction successful!", detail));

        Ok(PollOutcome::Applied {
            action: intent.action,
            coord: intent.coord,
            tx: intent.tx,
        })
    }

    /// Collect the selected tile's income into the player's earnings.
    pub fn harvest(&mut self, now: Instant) -> Result<Wei, ActionError> {
        let result = self.try_harvest(now);
        self.report(result)
    }

    fn try_harvest(&mut self, now: Instant) -> Result<Wei, ActionError> {
        let owner = self.sub_account()?.clone();
        let coord = self.selected_coord()?;
        let amount = self.world.harvest(coord, &owner, self.world_ms(now))?;
        self.stats.record_earnings(amount);
        self.notifier.notify(Notice::new(
            NoticeKind::Success,
            "Harvested",
            format!("Collected {amount} ETH from tile ({}, {})", coord.x, coord.y),
        ));
        Ok(amount)
    }

    /// Accrue WB tokens up to `now`. Returns the amount credited; nothing
    /// accrues while no account is connected.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if self.accounts.is_none() {
            return 0.0;
        }
        self.accrual.advance(&mut self.stats, now)
    }

    fn report<T>(&mut self, result: Result<T, ActionError>) -> Result<T, ActionError> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, "action refused");
            self.notifier
                .notify(Notice::new(NoticeKind::Error, e.title(), e.to_string()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use worldbuilder_kernel::INCOME_PERIOD_MS;
    use worldbuilder_wallet::{InMemoryWallet, Receipt};

    use crate::notify::RecordingNotifier;

    type TestSession = Session<InMemoryWallet, RecordingNotifier>;

    fn player() -> Address {
        Address::parse("0x4444444444444444444444444444444444444444").unwrap()
    }

    fn universal() -> Address {
        Address::parse("0x5555555555555555555555555555555555555555").unwrap()
    }

    fn eth(s: &str) -> Wei {
        Wei::parse_ether(s).unwrap()
    }

    fn session_with_balance(balance: Wei) -> TestSession {
        let wallet = InMemoryWallet::new().with_balance(&player(), balance);
        let mut s = Session::new(
            WorldBuilderConfig::default(),
            wallet,
            RecordingNotifier::new(),
            1_000,
        );
        s.connect(Accounts::sub_only(player()));
        s
    }

    fn unowned(s: &TestSession) -> TileCoord {
        s.world()
            .tiles()
            .iter()
            .find(|t| t.owner.is_none())
            .map(|t| t.coord)
            .unwrap()
    }

    fn confirm_pending(s: &mut TestSession) {
        let tx = s.pending().unwrap().tx.clone();
        s.wallet_mut().confirm(&tx).unwrap();
    }

    /// Buy the first unowned tile and confirm it; returns its coordinate.
    fn owned_tile(s: &mut TestSession) -> TileCoord {
        let c = unowned(s);
        s.select(c).unwrap();
        s.buy_land().unwrap();
        confirm_pending(s);
        assert!(matches!(s.poll(s.started_at()).unwrap(), PollOutcome::Applied { .. }));
        c
    }

    #[test]
    fn selection_state_machine() {
        let mut s = session_with_balance(eth("1"));
        assert_eq!(s.selection(), Selection::NoSelection);

        s.select(TileCoord::new(0, 0)).unwrap();
        assert_eq!(s.selection(), Selection::TileSelected(TileCoord::new(0, 0)));
        assert!(s.selected_tile().unwrap().owner.is_some());

        assert_eq!(
            s.select(TileCoord::new(20, 0)),
            Err(ActionError::InvalidSelection)
        );
        assert_eq!(s.selection(), Selection::TileSelected(TileCoord::new(0, 0)));

        s.clear_selection();
        assert_eq!(s.selection(), Selection::NoSelection);
    }

    #[test]
    fn buy_without_selection_fails() {
        let mut s = session_with_balance(eth("1"));
        assert_eq!(s.buy_land(), Err(ActionError::InvalidSelection));
        assert_eq!(s.notifier().last().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn actions_require_a_connected_account() {
        let mut s = session_with_balance(eth("1"));
        s.disconnect();
        s.select(TileCoord::new(0, 1)).unwrap();
        assert_eq!(s.buy_land(), Err(ActionError::NotConnected));
        assert_eq!(s.build(Building::House), Err(ActionError::NotConnected));
    }

    #[test]
    fn buying_owned_land_fails_and_changes_nothing() {
        let mut s = session_with_balance(eth("1"));
        let c = TileCoord::new(0, 0);
        let before = s.world().tile(c).cloned();
        s.select(c).unwrap();

        assert_eq!(s.buy_land(), Err(ActionError::AlreadyOwned(c)));
        assert_eq!(s.world().tile(c).cloned(), before);
        assert_eq!(s.wallet().transfer_count(), 0);
        assert_eq!(s.notifier().last().unwrap().title, "Land already owned");
    }

    #[test]
    fn insufficient_balance_issues_no_transfer() {
        let mut s = session_with_balance(Wei(10));
        let c = unowned(&s);
        s.select(c).unwrap();
        assert_eq!(
            s.buy_land(),
            Err(ActionError::InsufficientBalance {
                required: s.config().land_price,
                available: Wei(10),
            })
        );
        assert_eq!(s.wallet().transfer_count(), 0);
        assert!(!s.is_busy());
    }

    #[test]
    fn insufficient_balance_for_building() {
        let mut s = session_with_balance(eth("0.01"));
        let c = owned_tile(&mut s);
        assert!(matches!(
            s.build(Building::Shop),
            Err(ActionError::InsufficientBalance { .. })
        ));
        assert_eq!(s.wallet().transfer_count(), 1);
        assert_eq!(s.world().tile(c).unwrap().building, Building::Empty);
    }

    #[test]
    fn purchase_end_to_end() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        let land_before = s.stats().total_land;

        let tx = s.buy_land().unwrap();
        assert!(s.is_busy());
        assert_eq!(s.poll(s.started_at()).unwrap(), PollOutcome::Pending);
        assert!(s.world().tile(c).unwrap().owner.is_none());

        s.wallet_mut().confirm(&tx).unwrap();
        assert_eq!(
            s.poll(s.started_at()).unwrap(),
            PollOutcome::Applied {
                action: IntentAction::PurchaseLand,
                coord: c,
                tx,
            }
        );
        assert!(s.world().tile(c).unwrap().is_owned_by(&player()));
        assert_eq!(s.stats().total_land, land_before + 1);
        assert!(!s.is_busy());
        // Selection survives a confirmed purchase.
        assert_eq!(s.selection(), Selection::TileSelected(c));
        assert_eq!(s.notifier().last().unwrap().detail, "Land purchased!");
        assert_eq!(s.poll(s.started_at()).unwrap(), PollOutcome::Idle);
    }

    #[test]
    fn transfer_goes_to_treasury_with_tag() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.buy_land().unwrap();

        let sent = s.wallet().submitted()[0].clone();
        let intent = s.pending().unwrap();
        assert_eq!(sent.to, s.config().treasury);
        assert_eq!(sent.from, player());
        assert_eq!(sent.value, s.config().land_price);
        assert_eq!(sent.tag.as_deref(), Some(intent.tag.as_str()));
    }

    #[test]
    fn build_end_to_end() {
        let mut s = session_with_balance(eth("1"));
        let c = owned_tile(&mut s);

        s.build(Building::Shop).unwrap();
        confirm_pending(&mut s);
        assert!(matches!(
            s.poll(s.started_at()).unwrap(),
            PollOutcome::Applied {
                action: IntentAction::Build(Building::Shop),
                ..
            }
        ));

        let shop = s.config().buildings.shop.clone();
        let tile = s.world().tile(c).unwrap();
        assert_eq!(tile.building, Building::Shop);
        assert_eq!(tile.income, shop.income);
        assert_eq!(tile.wb_income, shop.wb_per_second);
        assert_eq!(s.stats().wb_per_second, shop.wb_per_second);
    }

    #[test]
    fn build_on_foreign_tile_is_not_owner() {
        let mut s = session_with_balance(eth("1"));
        let c = TileCoord::new(0, 1); // seed 1: unowned
        s.select(c).unwrap();
        assert_eq!(s.build(Building::House), Err(ActionError::NotOwner(c)));

        let seeded = TileCoord::new(0, 10); // seed 10: owned by someone else
        s.select(seeded).unwrap();
        assert_eq!(s.build(Building::House), Err(ActionError::NotOwner(seeded)));
        assert_eq!(s.wallet().transfer_count(), 0);
    }

    #[test]
    fn build_on_built_tile_is_already_built() {
        let mut s = session_with_balance(eth("1"));
        let c = owned_tile(&mut s);
        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        s.poll(s.started_at()).unwrap();

        assert_eq!(s.build(Building::Shop), Err(ActionError::AlreadyBuilt(c)));
        assert_eq!(s.build(Building::Empty), Err(ActionError::NoBuildingChosen));
    }

    #[test]
    fn only_one_action_in_flight() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.buy_land().unwrap();
        assert_eq!(s.buy_land(), Err(ActionError::ActionPending));
        assert_eq!(s.wallet().transfer_count(), 1);
    }

    #[test]
    fn pending_intent_is_bound_to_its_tile() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.buy_land().unwrap();

        // Moving the selection does not redirect the purchase.
        s.select(TileCoord::new(0, 0)).unwrap();
        confirm_pending(&mut s);
        s.poll(s.started_at()).unwrap();
        assert!(s.world().tile(c).unwrap().is_owned_by(&player()));
        assert!(!s.world().tile(TileCoord::new(0, 0)).unwrap().is_owned_by(&player()));
    }

    #[test]
    fn rejected_submission_changes_nothing() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.wallet_mut().reject_next("user declined");
        assert_eq!(
            s.buy_land(),
            Err(ActionError::TransactionRejected("user declined".into()))
        );
        assert!(!s.is_busy());
        assert!(s.world().tile(c).unwrap().owner.is_none());
    }

    #[test]
    fn failed_transaction_clears_intent() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        let tx = s.buy_land().unwrap();
        s.wallet_mut().fail(&tx, "reverted").unwrap();

        assert_eq!(
            s.poll(s.started_at()),
            Err(ActionError::TransactionRejected("reverted".into()))
        );
        assert!(!s.is_busy());
        assert!(s.world().tile(c).unwrap().owner.is_none());
        assert_eq!(s.stats().total_land, 0);
        assert_eq!(s.selection(), Selection::TileSelected(c));
        assert_eq!(s.notifier().last().unwrap().title, "Transaction failed");
    }

    #[test]
    fn mismatched_receipt_is_not_applied() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        let tx = s.buy_land().unwrap();

        let bogus = Receipt {
            hash: tx.clone(),
            from: player(),
            to: s.config().treasury.clone(),
            value: s.config().land_price,
            tag: Some("00000000000000000000000000000000".into()),
        };
        s.wallet_mut().confirm_with(&tx, bogus).unwrap();

        assert!(matches!(s.poll(s.started_at()), Err(ActionError::ReceiptMismatch(_))));
        assert!(s.world().tile(c).unwrap().owner.is_none());
        assert!(!s.is_busy());
        assert!(s.world().events().is_empty());
    }

    #[test]
    fn universal_funding_pays_but_sub_owns() {
        let wallet = InMemoryWallet::new()
            .with_balance(&player(), Wei::ZERO)
            .with_balance(&universal(), eth("1"));
        let mut s = Session::new(
            WorldBuilderConfig::default(),
            wallet,
            RecordingNotifier::new(),
            0,
        );
        s.connect(Accounts {
            sub: player(),
            universal: Some(universal()),
        });
        let c = unowned(&s);
        s.select(c).unwrap();
        assert!(matches!(
            s.buy_land(),
            Err(ActionError::InsufficientBalance { .. })
        ));

        s.set_funding(FundingSource::Universal).unwrap();
        let tx = s.buy_land().unwrap();
        assert_eq!(s.wallet().submitted()[0].from, universal());
        s.wallet_mut().confirm(&tx).unwrap();
        s.poll(s.started_at()).unwrap();
        assert!(s.world().tile(c).unwrap().is_owned_by(&player()));
    }

    #[test]
    fn universal_funding_requires_universal_account() {
        let mut s = session_with_balance(eth("1"));
        assert_eq!(
            s.set_funding(FundingSource::Universal),
            Err(ActionError::NotConnected)
        );
        assert_eq!(s.funding(), FundingSource::Sub);
    }

    #[test]
    fn harvest_credits_earnings() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        let c = owned_tile(&mut s);
        assert_eq!(
            s.harvest(t0 + Duration::from_secs(1)),
            Err(ActionError::NothingToHarvest(c))
        );

        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        s.poll(t0).unwrap();

        let got = s
            .harvest(t0 + Duration::from_millis(INCOME_PERIOD_MS))
            .unwrap();
        assert_eq!(got, s.config().buildings.house.income);
        assert_eq!(s.stats().total_earnings, got);
    }

    #[test]
    fn income_accrues_only_after_the_build_confirms() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        let c = owned_tile(&mut s);
        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        let built = t0 + Duration::from_millis(10 * INCOME_PERIOD_MS);
        s.poll(built).unwrap();
        assert_eq!(s.world().tile(c).unwrap().last_harvest_ms, s.world_ms(built));

        assert_eq!(s.harvest(built).unwrap(), Wei::ZERO);
        let later = built + Duration::from_millis(INCOME_PERIOD_MS);
        assert_eq!(s.harvest(later).unwrap(), s.config().buildings.house.income);
    }

    #[test]
    fn tokens_accrue_from_owned_buildings() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        owned_tile(&mut s);
        s.build(Building::Attraction).unwrap();
        confirm_pending(&mut s);
        s.poll(t0).unwrap();

        assert_eq!(s.tick(t0), 0.0);
        let credited = s.tick(t0 + Duration::from_millis(500));
        let rate = s.config().buildings.attraction.wb_per_second;
        assert!((credited - rate * 0.5).abs() < 1e-9);
        assert!((s.stats().total_wb - rate * 0.5).abs() < 1e-9);
    }

    #[test]
    fn rate_change_applies_from_confirmation_onwards() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        owned_tile(&mut s);
        assert_eq!(s.tick(t0), 0.0);

        s.build(Building::Attraction).unwrap();
        confirm_pending(&mut s);
        s.poll(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(s.stats().total_wb, 0.0);

        s.tick(t0 + Duration::from_secs(2));
        let rate = s.config().buildings.attraction.wb_per_second;
        assert!((s.stats().total_wb - rate).abs() < 1e-9);
    }

    #[test]
    fn no_tokens_accrue_while_disconnected() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        owned_tile(&mut s);
        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        s.poll(t0).unwrap();

        s.disconnect();
        assert_eq!(s.tick(t0 + Duration::from_secs(5)), 0.0);
        s.connect(Accounts::sub_only(player()));
        assert_eq!(s.tick(t0 + Duration::from_secs(6)), 0.0);
        assert_eq!(s.stats().total_wb, 0.0);
    }

    #[test]
    fn stats_follow_the_connected_account() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.buy_land().unwrap();

        let other = Address::parse("0x6666666666666666666666666666666666666666").unwrap();
        s.disconnect();
        s.connect(Accounts::sub_only(other));
        confirm_pending(&mut s);
        s.poll(s.started_at()).unwrap();

        assert!(s.world().tile(c).unwrap().is_owned_by(&player()));
        assert_eq!(s.stats().total_land, 0);
        assert_eq!(s.stats().rank, 42);
    }

    #[test]
    fn switching_accounts_resets_accumulated_totals() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        owned_tile(&mut s);
        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        s.poll(t0).unwrap();
        s.harvest(t0 + Duration::from_millis(INCOME_PERIOD_MS)).unwrap();
        s.tick(t0 + Duration::from_secs(1));
        assert!(s.stats().total_wb > 0.0);

        let other = Address::parse("0x6666666666666666666666666666666666666666").unwrap();
        s.connect(Accounts::sub_only(other));
        assert_eq!(s.stats().total_earnings, Wei::ZERO);
        assert_eq!(s.stats().total_wb, 0.0);

        // Coming back to the first account starts from scratch too.
        s.connect(Accounts::sub_only(player()));
        assert_eq!(s.stats().total_land, 1);
        assert_eq!(s.stats().total_earnings, Wei::ZERO);
    }

    #[test]
    fn reconnecting_the_same_account_keeps_totals() {
        let mut s = session_with_balance(eth("1"));
        let t0 = s.started_at();
        owned_tile(&mut s);
        s.build(Building::House).unwrap();
        confirm_pending(&mut s);
        s.poll(t0).unwrap();
        let got = s
            .harvest(t0 + Duration::from_millis(INCOME_PERIOD_MS))
            .unwrap();

        s.disconnect();
        s.connect(Accounts::sub_only(player()));
        assert_eq!(s.stats().total_earnings, got);
    }

    #[test]
    fn unknown_transaction_clears_intent() {
        let mut s = session_with_balance(eth("1"));
        let c = unowned(&s);
        s.select(c).unwrap();
        s.buy_land().unwrap();

        *s.wallet_mut() = InMemoryWallet::new().with_balance(&player(), eth("1"));
        assert!(matches!(
            s.poll(s.started_at()),
            Err(ActionError::Wallet(WalletError::UnknownTransaction(_)))
        ));
        assert!(!s.is_busy());
        assert!(s.world().tile(c).unwrap().owner.is_none());
        assert_eq!(s.poll(s.started_at()).unwrap(), PollOutcome::Idle);
    }

    fn funded_session() -> TestSession {
        let wallet = InMemoryWallet::new().with_balance(&universal(), eth("1"));
        let mut s = Session::new(
            WorldBuilderConfig::default(),
            wallet,
            RecordingNotifier::new(),
            0,
        );
        s.connect(Accounts {
            sub: player(),
            universal: Some(universal()),
        });
        s
    }

    #[test]
    fn fund_sub_account_moves_value_on_confirmation() {
        let mut s = funded_session();
        let tx = s.fund_sub_account(eth("0.1")).unwrap();

        let sent = s.wallet().submitted()[0].clone();
        assert_eq!(sent.from, universal());
        assert_eq!(sent.to, player());
        assert_eq!(sent.value, eth("0.1"));
        assert_eq!(sent.tag, None);
        assert!(!s.is_busy());

        s.wallet_mut().confirm(&tx).unwrap();
        assert_eq!(s.wallet().balance(&player()).unwrap(), eth("0.1"));
        assert_eq!(s.wallet().balance(&universal()).unwrap(), eth("0.9"));
        assert_eq!(s.notifier().last().unwrap().title, "Transfer initiated!");
    }

    #[test]
    fn fund_sub_account_is_validated() {
        let mut s = funded_session();
        assert_eq!(s.fund_sub_account(Wei::ZERO), Err(ActionError::InvalidAmount));
        assert_eq!(
            s.fund_sub_account(eth("2")),
            Err(ActionError::InsufficientBalance {
                required: eth("2"),
                available: eth("1"),
            })
        );
        assert_eq!(s.wallet().transfer_count(), 0);

        let mut sub_only = session_with_balance(eth("1"));
        assert_eq!(
            sub_only.fund_sub_account(eth("0.1")),
            Err(ActionError::NotConnected)
        );
    }
}

use serde::Serialize;
use std::collections::HashMap;
use worldbuilder_common::{Address, Wei};
use worldbuilder_kernel::World;

/// Aggregate counters for the local player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    /// Tiles owned by the player.
    pub total_land: u32,
    /// Income collected through harvests.
    pub total_earnings: Wei,
    /// WB tokens accrued so far.
    pub total_wb: f64,
    /// Sum of `wb_income` over the player's tiles.
    pub wb_per_second: f64,
    /// 1-based position among all owners, by land held.
    pub rank: u32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            total_land: 0,
            total_earnings: Wei::ZERO,
            total_wb: 0.0,
            wb_per_second: 0.0,
            rank: 1,
        }
    }
}

impl PlayerStats {
    /// Stats for `account` in a freshly observed world, with no accumulated
    /// earnings or tokens.
    pub fn for_account(world: &World, account: &Address) -> Self {
        let mut stats = Self::default();
        stats.refresh(world, account);
        stats
    }

    /// Recompute the derived fields from the tile set. Accumulated earnings
    /// and tokens are kept.
    pub fn refresh(&mut self, world: &World, account: &Address) {
        let (land, rate) = world
            .tiles_owned_by(account)
            .fold((0u32, 0.0f64), |(n, r), t| (n + 1, r + t.wb_income));
        self.total_land = land;
        self.wb_per_second = rate;
        self.rank = rank_of(world, account);
        tracing::debug!(
            total_land = self.total_land,
            wb_per_second = self.wb_per_second,
            rank = self.rank,
            "player stats refreshed"
        );
    }

    pub fn record_earnings(&mut self, amount: Wei) {
        self.total_earnings = self.total_earnings.saturating_add(amount);
    }

    pub fn credit_wb(&mut self, amount: f64) {
        self.total_wb += amount;
    }
}

/// Rank of `account`: one more than the number of other owners holding
/// strictly more tiles.
pub fn rank_of(world: &World, account: &Address) -> u32 {
    let mut holdings: HashMap<&Address, u32> = HashMap::new();
    for owner in world.tiles().iter().filter_map(|t| t.owner.as_ref()) {
        *holdings.entry(owner).or_default() += 1;
    }
    let mine = holdings.get(account).copied().unwrap_or(0);
    let ahead = holdings
        .iter()
        .filter(|(owner, count)| **owner != account && **count > mine)
        .count();
    ahead as u32 + 1
}

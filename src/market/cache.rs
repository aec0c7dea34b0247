use std::collections::BTreeMap;

use crate::id::{AuctionId, TerritoryId};
use crate::model::Auction;

/// Best-effort mirror of the store's active auctions.
///
/// Single writer: only authoritative records returned by store transactions
/// are applied, so the cache never diverges from what actually committed.
/// It is never consulted for conflict resolution; the store's transaction
/// mechanism is the one source of truth for "who bid higher first".
///
/// BTreeMap for deterministic iteration.
#[derive(Debug, Clone, Default)]
pub struct AuctionCache {
    auctions: BTreeMap<AuctionId, Auction>,
}

impl AuctionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an authoritative record. Terminal auctions are evicted rather
    /// than stored.
    pub fn apply(&mut self, auction: Auction) {
        if auction.status.is_terminal() {
            self.auctions.remove(&auction.id);
        } else {
            self.auctions.insert(auction.id.clone(), auction);
        }
    }

    pub fn remove(&mut self, id: &AuctionId) {
        self.auctions.remove(id);
    }

    pub fn get(&self, id: &AuctionId) -> Option<&Auction> {
        self.auctions.get(id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Auction> {
        self.auctions.values()
    }

    pub fn has_active_for(&self, territory: &TerritoryId) -> bool {
        self.auctions.values().any(|a| &a.territory_id == territory)
    }

    pub fn len(&self) -> usize {
        self.auctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auctions.is_empty()
    }

    pub fn clear(&mut self) {
        self.auctions.clear();
    }
}

//! The authoritative-store seam.
//!
//! True mutual exclusion comes only from the store's transaction mechanism:
//! in-process state is never trusted for conflict resolution. Every
//! implementation must make `insert_auction`, `commit_bid`,
//! `finalize_auction`, and `grant_ownership` atomic read-modify-write steps
//! that re-validate against live state before writing.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::id::{AuctionId, TerritoryId};
use crate::market::buffs::CountryHoldings;
use crate::market::error::MarketError;
use crate::market::finalize::Finalization;
use crate::market::integrity::AuctionRepair;
use crate::model::{Auction, Bid, Territory};

#[allow(async_fn_in_trait)]
pub trait AuctionStore {
    async fn territory(&self, id: &TerritoryId) -> Result<Option<Territory>, MarketError>;

    async fn auction(&self, id: &AuctionId) -> Result<Option<Auction>, MarketError>;

    /// The in-progress auction on a territory, if any.
    async fn active_auction_for(
        &self,
        territory: &TerritoryId,
    ) -> Result<Option<Auction>, MarketError>;

    async fn active_auctions(&self) -> Result<Vec<Auction>, MarketError>;

    /// Registry adjacency: sorted neighbor ids.
    async fn neighbors(&self, territory: &TerritoryId) -> Result<Vec<TerritoryId>, MarketError>;

    /// How much of `country` the given owner holds.
    async fn country_holdings(
        &self,
        country: &str,
        owner_id: &str,
    ) -> Result<CountryHoldings, MarketError>;

    /// Upsert a territory record (registry seeding and admin edits).
    async fn put_territory(&self, territory: &Territory) -> Result<(), MarketError>;

    /// Atomically create an auction and update its territory (pointer and,
    /// for unconquered territories, the `contested` flip). Fails with
    /// `AuctionInProgress` when the live territory already carries an
    /// auction pointer, which closes the race between concurrent creators.
    async fn insert_auction(
        &self,
        auction: &Auction,
        territory: &Territory,
    ) -> Result<(), MarketError>;

    /// Atomically commit a bid. The live auction is re-read inside the
    /// transaction and the bid re-validated against it; a racing writer
    /// that raised the floor first makes this fail with
    /// `TransactionConflict` and nothing is written. On success the
    /// authoritative post-commit record is returned.
    async fn commit_bid(&self, id: &AuctionId, bid: Bid) -> Result<Auction, MarketError>;

    /// Atomically finalize an auction: re-read auction and territory, apply
    /// `plan_finalization`, commit both records together. Idempotent:
    /// a terminal auction yields `AlreadyEnded` with no effects.
    async fn finalize_auction(
        &self,
        id: &AuctionId,
        now: DateTime<Utc>,
    ) -> Result<Finalization, MarketError>;

    /// Atomically grant ownership outside any auction (instant conquest).
    /// Fails on owned (`TerritoryAlreadyOwned`) or contested
    /// (`AuctionInProgress`) territories.
    async fn grant_ownership(
        &self,
        territory: &TerritoryId,
        owner_id: &str,
        owner_name: &str,
        protection_until: DateTime<Utc>,
    ) -> Result<Territory, MarketError>;

    /// Persist integrity-guard corrections.
    async fn repair_auction(
        &self,
        id: &AuctionId,
        repair: &AuctionRepair,
    ) -> Result<(), MarketError>;
}

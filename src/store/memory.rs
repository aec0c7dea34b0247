use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::AuctionStore;
use crate::id::{AuctionId, TerritoryId};
use crate::market::buffs::CountryHoldings;
use crate::market::error::MarketError;
use crate::market::finalize::{Finalization, apply_plan, plan_finalization};
use crate::market::integrity::AuctionRepair;
use crate::model::{
    Auction, AuctionStatus, Bid, Sovereignty, Territory, auction_from_value, territory_from_value,
};

#[derive(Debug, Default)]
struct Inner {
    territories: BTreeMap<TerritoryId, Territory>,
    auctions: BTreeMap<AuctionId, Auction>,
    /// Bidirectional, sorted neighbor lists.
    adjacency: BTreeMap<TerritoryId, Vec<TerritoryId>>,
}

/// In-memory `AuctionStore` with the same transactional semantics as the
/// Postgres store: every mutating call validates against live state under
/// one lock, so concurrent writers observe each other's commits.
///
/// Cloning shares the underlying state: two engine instances over clones
/// of one `MemoryStore` race against the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bidirectional adjacency edge. Keeps neighbor lists sorted.
    pub fn add_adjacency(&self, a: &TerritoryId, b: &TerritoryId) {
        let mut inner = self.lock();
        for (from, to) in [(a, b), (b, a)] {
            let neighbors = inner.adjacency.entry(from.clone()).or_default();
            if let Err(pos) = neighbors.binary_search(to) {
                neighbors.insert(pos, to.clone());
            }
        }
    }

    /// Ingest a loose territory document (snake_case or camelCase keys)
    /// through the wire normalization boundary.
    pub fn import_territory(&self, value: serde_json::Value) -> Result<Territory, MarketError> {
        let territory = territory_from_value(value)?;
        self.lock()
            .territories
            .insert(territory.id.clone(), territory.clone());
        Ok(territory)
    }

    /// Ingest a loose auction document through the wire normalization
    /// boundary.
    pub fn import_auction(&self, value: serde_json::Value) -> Result<Auction, MarketError> {
        let auction = auction_from_value(value)?;
        self.lock()
            .auctions
            .insert(auction.id.clone(), auction.clone());
        Ok(auction)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl AuctionStore for MemoryStore {
    async fn territory(&self, id: &TerritoryId) -> Result<Option<Territory>, MarketError> {
        Ok(self.lock().territories.get(id).cloned())
    }

    async fn auction(&self, id: &AuctionId) -> Result<Option<Auction>, MarketError> {
        Ok(self.lock().auctions.get(id).cloned())
    }

    async fn active_auction_for(
        &self,
        territory: &TerritoryId,
    ) -> Result<Option<Auction>, MarketError> {
        Ok(self
            .lock()
            .auctions
            .values()
            .find(|a| &a.territory_id == territory && a.status == AuctionStatus::Active)
            .cloned())
    }

    async fn active_auctions(&self) -> Result<Vec<Auction>, MarketError> {
        Ok(self
            .lock()
            .auctions
            .values()
            .filter(|a| a.status == AuctionStatus::Active)
            .cloned()
            .collect())
    }

    async fn neighbors(&self, territory: &TerritoryId) -> Result<Vec<TerritoryId>, MarketError> {
        Ok(self
            .lock()
            .adjacency
            .get(territory)
            .cloned()
            .unwrap_or_default())
    }

    async fn country_holdings(
        &self,
        country: &str,
        owner_id: &str,
    ) -> Result<CountryHoldings, MarketError> {
        let inner = self.lock();
        let mut holdings = CountryHoldings::default();
        for territory in inner.territories.values() {
            if territory.country != country {
                continue;
            }
            holdings.total += 1;
            if territory.owner_id.as_deref() == Some(owner_id) {
                holdings.owned += 1;
            }
        }
        Ok(holdings)
    }

    async fn put_territory(&self, territory: &Territory) -> Result<(), MarketError> {
        self.lock()
            .territories
            .insert(territory.id.clone(), territory.clone());
        Ok(())
    }

    async fn insert_auction(
        &self,
        auction: &Auction,
        territory: &Territory,
    ) -> Result<(), MarketError> {
        let mut inner = self.lock();
        let live = inner
            .territories
            .get(&auction.territory_id)
            .ok_or_else(|| MarketError::TerritoryNotFound(auction.territory_id.clone()))?;
        // re-check against live state: a concurrent creator may have won
        if live.current_auction.is_some() {
            return Err(MarketError::AuctionInProgress(auction.territory_id.clone()));
        }
        if inner
            .auctions
            .values()
            .any(|a| a.territory_id == auction.territory_id && a.status == AuctionStatus::Active)
        {
            return Err(MarketError::AuctionInProgress(auction.territory_id.clone()));
        }
        inner.auctions.insert(auction.id.clone(), auction.clone());
        inner
            .territories
            .insert(territory.id.clone(), territory.clone());
        Ok(())
    }

    async fn commit_bid(&self, id: &AuctionId, bid: Bid) -> Result<Auction, MarketError> {
        let mut inner = self.lock();
        let auction = inner
            .auctions
            .get_mut(id)
            .ok_or_else(|| MarketError::AuctionNotFound(id.clone()))?;
        if auction.status != AuctionStatus::Active {
            return Err(MarketError::AuctionNotActive(id.clone()));
        }
        // the conflict check: a racing writer may have raised the floor
        // between the caller's read and this commit
        if bid.amount < auction.minimum_next_bid() {
            return Err(MarketError::TransactionConflict);
        }
        auction.current_bid = bid.amount;
        auction.highest_bidder = Some(bid.bidder_id.clone());
        auction.highest_bidder_name = Some(bid.bidder_name.clone());
        auction.bids.push(bid);
        Ok(auction.clone())
    }

    async fn finalize_auction(
        &self,
        id: &AuctionId,
        now: DateTime<Utc>,
    ) -> Result<Finalization, MarketError> {
        let mut inner = self.lock();
        let mut auction = inner
            .auctions
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::AuctionNotFound(id.clone()))?;
        let mut territory = inner
            .territories
            .get(&auction.territory_id)
            .cloned()
            .ok_or_else(|| MarketError::TerritoryNotFound(auction.territory_id.clone()))?;

        let plan = plan_finalization(&auction, &territory, now);
        apply_plan(&plan, &mut auction, &mut territory);

        inner.auctions.insert(auction.id.clone(), auction.clone());
        inner
            .territories
            .insert(territory.id.clone(), territory.clone());
        Ok(Finalization {
            plan,
            auction,
            territory,
        })
    }

    async fn grant_ownership(
        &self,
        territory: &TerritoryId,
        owner_id: &str,
        owner_name: &str,
        protection_until: DateTime<Utc>,
    ) -> Result<Territory, MarketError> {
        let mut inner = self.lock();
        let record = inner
            .territories
            .get_mut(territory)
            .ok_or_else(|| MarketError::TerritoryNotFound(territory.clone()))?;
        if record.owner_id.is_some() {
            return Err(MarketError::TerritoryAlreadyOwned(territory.clone()));
        }
        if record.current_auction.is_some() {
            return Err(MarketError::AuctionInProgress(territory.clone()));
        }
        record.owner_id = Some(owner_id.to_string());
        record.owner_name = Some(owner_name.to_string());
        record.sovereignty = Sovereignty::Protected;
        record.protection_until = Some(protection_until);
        Ok(record.clone())
    }

    async fn repair_auction(
        &self,
        id: &AuctionId,
        repair: &AuctionRepair,
    ) -> Result<(), MarketError> {
        let mut inner = self.lock();
        let auction = inner
            .auctions
            .get_mut(id)
            .ok_or_else(|| MarketError::AuctionNotFound(id.clone()))?;
        repair.apply_to(auction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn tid(code: &str) -> TerritoryId {
        TerritoryId::new("USA", code).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 28, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn put_and_read_territory() {
        let store = MemoryStore::new();
        let territory = Territory::unconquered(tid("01"), "One");
        store.put_territory(&territory).await.unwrap();
        assert_eq!(store.territory(&tid("01")).await.unwrap(), Some(territory));
        assert_eq!(store.territory(&tid("02")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn adjacency_is_bidirectional_and_sorted() {
        let store = MemoryStore::new();
        store.add_adjacency(&tid("02"), &tid("01"));
        store.add_adjacency(&tid("02"), &tid("03"));
        store.add_adjacency(&tid("02"), &tid("01")); // duplicate ignored

        assert_eq!(
            store.neighbors(&tid("02")).await.unwrap(),
            vec![tid("01"), tid("03")]
        );
        assert_eq!(store.neighbors(&tid("01")).await.unwrap(), vec![tid("02")]);
    }

    #[tokio::test]
    async fn country_holdings_counts_owner_fraction() {
        let store = MemoryStore::new();
        for (code, owner) in [("01", Some("u1")), ("02", Some("u1")), ("03", None)] {
            let mut t = Territory::unconquered(tid(code), code);
            t.owner_id = owner.map(String::from);
            store.put_territory(&t).await.unwrap();
        }
        let mut fra = Territory::unconquered(TerritoryId::new("FRA", "75").unwrap(), "Paris");
        fra.owner_id = Some("u1".into());
        store.put_territory(&fra).await.unwrap();

        let holdings = store.country_holdings("USA", "u1").await.unwrap();
        assert_eq!(holdings, CountryHoldings { owned: 2, total: 3 });
    }

    #[tokio::test]
    async fn grant_ownership_rejects_owned_and_contested() {
        let store = MemoryStore::new();
        let mut t = Territory::unconquered(tid("01"), "One");
        store.put_territory(&t).await.unwrap();

        let granted = store
            .grant_ownership(&tid("01"), "u1", "One", now() + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(granted.owner_id.as_deref(), Some("u1"));
        assert_eq!(granted.sovereignty, Sovereignty::Protected);

        // already owned
        let err = store
            .grant_ownership(&tid("01"), "u2", "Two", now() + Duration::days(7))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::TerritoryAlreadyOwned(_)));

        // contested
        t = Territory::unconquered(tid("02"), "Two");
        t.current_auction = Some(AuctionId::new(&tid("02"), now()));
        store.put_territory(&t).await.unwrap();
        let err = store
            .grant_ownership(&tid("02"), "u2", "Two", now() + Duration::days(7))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::AuctionInProgress(_)));
    }

    #[tokio::test]
    async fn import_auction_normalizes_legacy_document() {
        let store = MemoryStore::new();
        let auction = store
            .import_auction(json!({
                "id": "USA-01-1724800000",
                "territoryId": "USA-01",
                "territoryName": "One",
                "status": "active",
                "startingBid": 100,
                "currentBid": 100,
                "startTime": 1724800000000_i64,
                "endTime": 1724886400000_i64,
            }))
            .unwrap();
        assert_eq!(
            store.auction(&auction.id).await.unwrap().unwrap(),
            auction
        );
    }
}

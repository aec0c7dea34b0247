#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use landrush::market::{AuctionEngine, FixedPriceOracle, MarketConfig};
use landrush::{AuctionStore, MemoryStore, Sovereignty, Territory, TerritoryId};

pub fn tid(code: &str) -> TerritoryId {
    TerritoryId::new("USA", code).unwrap()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 28, 12, 0, 0).unwrap()
}

/// Five unconquered USA territories with fixed prices and a small adjacency
/// graph:
///
///   01 (price 99)    04 (price 999) -- 02 (price 1000)
///   03 (price 50)    04             -- 03
///   05 (no price)
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (code, name) in [
        ("01", "Alpha"),
        ("02", "Beta"),
        ("03", "Gamma"),
        ("04", "Delta"),
        ("05", "Epsilon"),
    ] {
        store
            .put_territory(&Territory::unconquered(tid(code), name))
            .await
            .unwrap();
    }
    store.add_adjacency(&tid("04"), &tid("02"));
    store.add_adjacency(&tid("04"), &tid("03"));
    store
}

pub fn oracle() -> FixedPriceOracle {
    let mut oracle = FixedPriceOracle::new();
    oracle.set_price(tid("01"), 99);
    oracle.set_price(tid("02"), 1000);
    oracle.set_price(tid("03"), 50);
    oracle.set_price(tid("04"), 999);
    oracle
}

/// Engine plus a clone of its shared store for direct inspection.
pub async fn market() -> (AuctionEngine<MemoryStore, FixedPriceOracle>, MemoryStore) {
    let store = seeded_store().await;
    let engine = AuctionEngine::new(store.clone(), oracle(), MarketConfig::default());
    (engine, store)
}

pub async fn market_with_config(
    config: MarketConfig,
) -> (AuctionEngine<MemoryStore, FixedPriceOracle>, MemoryStore) {
    let store = seeded_store().await;
    let engine = AuctionEngine::new(store.clone(), oracle(), config);
    (engine, store)
}

/// Mark a territory as owned directly in the store, bypassing the auction
/// lifecycle.
pub async fn set_owner(store: &MemoryStore, id: &TerritoryId, owner: &str) {
    let mut territory = store.territory(id).await.unwrap().unwrap();
    territory.owner_id = Some(owner.to_string());
    territory.owner_name = Some(owner.to_uppercase());
    territory.sovereignty = Sovereignty::Ruled;
    store.put_territory(&territory).await.unwrap();
}

mod common;

use serde_json::json;

use landrush::{AuctionStore, MarketConfig, MarketError};

use common::{market, market_with_config, now};

/// Auction document for USA-01 as an earlier bugged writer left it: the
/// starting bid absorbed a tenfold price glitch.
fn corrupted_auction() -> serde_json::Value {
    json!({
        "id": "USA-01-1724846400",
        "territoryId": "USA-01",
        "territoryName": "Alpha",
        "status": "active",
        "startingBid": 1000,
        "currentBid": 1000,
        "minIncrement": 1,
        "startTime": 1724846400000_i64,
        "endTime": 1724932800000_i64,
    })
}

#[tokio::test]
async fn corrupted_floor_is_repaired_before_validation() {
    let (mut engine, store) = market().await;
    let auction = store.import_auction(corrupted_auction()).unwrap();

    // canonical floor for USA-01 is 100, so 101 must be accepted even
    // though the stored record claims 1000
    let receipt = engine
        .place_bid(&auction.id, "u1", "Uno", 101, now())
        .await
        .unwrap();
    assert_eq!(receipt.auction.starting_bid, 100);
    assert_eq!(receipt.auction.current_bid, 101);

    // and the repair was persisted, not just applied locally
    let stored = store.auction(&auction.id).await.unwrap().unwrap();
    assert_eq!(stored.starting_bid, 100);
    assert_eq!(stored.current_bid, 101);
}

#[tokio::test]
async fn repaired_floor_still_rejects_low_bids() {
    let (mut engine, store) = market().await;
    let auction = store.import_auction(corrupted_auction()).unwrap();

    let err = engine
        .place_bid(&auction.id, "u1", "Uno", 100, now())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidBid { minimum: 101 }));
}

#[tokio::test]
async fn read_only_view_corrects_without_writing() {
    let (engine, store) = market_with_config(MarketConfig::read_only()).await;
    let auction = store.import_auction(corrupted_auction()).unwrap();

    let viewed = engine.view_auction(&auction.id).await.unwrap();
    assert_eq!(viewed.starting_bid, 100);
    assert_eq!(viewed.current_bid, 100);

    // the stored record keeps its corruption until a writer comes along
    let stored = store.auction(&auction.id).await.unwrap().unwrap();
    assert_eq!(stored.starting_bid, 1000);
    assert_eq!(stored.current_bid, 1000);
}

#[tokio::test]
async fn writable_view_persists_the_repair() {
    let (engine, store) = market().await;
    let auction = store.import_auction(corrupted_auction()).unwrap();

    let viewed = engine.view_auction(&auction.id).await.unwrap();
    assert_eq!(viewed.starting_bid, 100);

    let stored = store.auction(&auction.id).await.unwrap().unwrap();
    assert_eq!(stored.starting_bid, 100);
    assert_eq!(stored.current_bid, 100);
}

#[tokio::test]
async fn unpriceable_territory_uses_the_plausibility_fallback() {
    let (engine, store) = market().await;
    // USA-05 has no oracle price; an absurd stored floor drops to the
    // configured fallback
    let auction = store
        .import_auction(json!({
            "id": "USA-05-1724846400",
            "territory_id": "USA-05",
            "territory_name": "Epsilon",
            "status": "active",
            "starting_bid": 5_000_000,
            "current_bid": 5_000_000,
            "start_time": 1724846400000_i64,
            "end_time": 1724932800000_i64,
        }))
        .unwrap();

    let viewed = engine.view_auction(&auction.id).await.unwrap();
    assert_eq!(viewed.starting_bid, 100);
    assert_eq!(viewed.current_bid, 100);
}

#[tokio::test]
async fn sane_record_passes_through_untouched() {
    let (engine, store) = market().await;
    let auction = store
        .import_auction(json!({
            "id": "USA-01-1724846400",
            "territoryId": "USA-01",
            "territoryName": "Alpha",
            "status": "active",
            "startingBid": 100,
            "currentBid": 100,
            "startTime": 1724846400000_i64,
            "endTime": 1724932800000_i64,
        }))
        .unwrap();

    let viewed = engine.view_auction(&auction.id).await.unwrap();
    assert_eq!(viewed, store.auction(&auction.id).await.unwrap().unwrap());
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AuctionId, TerritoryId};

/// Outbound notification consumed by rendering and UI collaborators.
///
/// Pushed to the engine outbox only after the corresponding store commit,
/// so a signal never describes state that failed to persist. Payloads are part
/// of the external contract; tests assert them exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketSignal {
    /// A new auction went live.
    AuctionStarted {
        auction_id: AuctionId,
        territory_id: TerritoryId,
        starting_bid: i64,
        end_time: DateTime<Utc>,
    },

    /// A bid was accepted and committed.
    AuctionUpdated {
        auction_id: AuctionId,
        territory_id: TerritoryId,
        current_bid: i64,
        bidder_id: String,
        bidder_name: String,
        /// Buff-adjusted display amount; ranking always used `current_bid`.
        effective_amount: i64,
    },

    /// An auction was finalized (with or without a winner).
    AuctionEnded {
        auction_id: AuctionId,
        territory_id: TerritoryId,
        winner_id: Option<String>,
        amount: Option<i64>,
    },

    /// A territory changed (or re-confirmed) hands.
    OwnershipTransferred {
        territory_id: TerritoryId,
        owner_id: String,
        owner_name: String,
        amount_paid: i64,
        /// False for the instant-conquest path.
        via_auction: bool,
    },
}

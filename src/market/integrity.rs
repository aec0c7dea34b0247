//! Detection and repair of auction records corrupted by earlier bugged
//! writes: a stored starting or current bid that diverges from what the
//! pricing rules would produce today.

use serde::{Deserialize, Serialize};

use super::config::MarketConfig;
use crate::model::Auction;

/// Corrections to persist (or apply locally when the caller cannot write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRepair {
    pub starting_bid: Option<i64>,
    pub current_bid: Option<i64>,
}

impl AuctionRepair {
    pub fn is_empty(&self) -> bool {
        self.starting_bid.is_none() && self.current_bid.is_none()
    }

    pub fn apply_to(&self, auction: &mut Auction) {
        if let Some(s) = self.starting_bid {
            auction.starting_bid = s;
        }
        if let Some(c) = self.current_bid {
            auction.current_bid = c;
        }
    }
}

/// Compare an auction record against current pricing rules and produce the
/// corrections needed, if any.
///
/// Heuristics, in order:
/// (a) a canonical starting bid that differs from the stored one wins;
/// (b) with no canonical price, an implausibly high stored starting bid is
///     forced down to the configured fallback;
/// (c) with no bidder, the current bid must equal the (corrected) starting
///     bid;
/// (d) with a bidder, the current bid must equal the highest raw amount in
///     the bid history, or the corrected starting bid if the history is
///     empty.
pub fn reconcile(
    auction: &Auction,
    canonical_starting_bid: Option<i64>,
    config: &MarketConfig,
) -> Option<AuctionRepair> {
    let mut new_starting = None;
    match canonical_starting_bid {
        Some(canonical) if canonical != auction.starting_bid => {
            new_starting = Some(canonical);
        }
        None if auction.starting_bid > config.sanity_ceiling => {
            new_starting = Some(config.fallback_starting_bid);
        }
        _ => {}
    }
    let starting = new_starting.unwrap_or(auction.starting_bid);

    let expected_current = if auction.highest_bidder.is_none() {
        starting
    } else {
        auction.highest_recorded_amount().unwrap_or(starting)
    };
    let new_current = (auction.current_bid != expected_current).then_some(expected_current);

    let repair = AuctionRepair {
        starting_bid: new_starting,
        current_bid: new_current,
    };
    (!repair.is_empty()).then_some(repair)
}

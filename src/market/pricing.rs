use std::collections::BTreeMap;

use crate::id::TerritoryId;
use crate::model::{AuctionKind, ProtectionTerm, Territory};

/// External collaborator that prices territories.
///
/// `None` means no canonical price is computable for this territory; the
/// integrity guard then falls back to plausibility checks instead of a
/// recomputed value.
pub trait PricingOracle {
    fn market_price(&self, territory: &Territory) -> Option<i64>;
}

/// Canonical starting bid for an auction on a territory priced `price`.
///
/// Standard auctions start one unit above the instant-purchase value so an
/// auction is never a discount route; protection extensions scale the price
/// by the term's multiplier.
pub fn canonical_starting_bid(kind: AuctionKind, term: ProtectionTerm, price: i64) -> i64 {
    match kind {
        AuctionKind::Standard => price + 1,
        AuctionKind::ProtectionExtension => (price as f64 * term.price_multiplier()).ceil() as i64,
    }
}

/// Map-backed oracle for tests and fixed-price deployments. Falls back to a
/// per-country default when a territory has no explicit price.
#[derive(Debug, Clone, Default)]
pub struct FixedPriceOracle {
    prices: BTreeMap<TerritoryId, i64>,
    country_defaults: BTreeMap<String, i64>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, territory: TerritoryId, price: i64) {
        self.prices.insert(territory, price);
    }

    pub fn set_country_default(&mut self, country: &str, price: i64) {
        self.country_defaults.insert(country.to_string(), price);
    }
}

impl PricingOracle for FixedPriceOracle {
    fn market_price(&self, territory: &Territory) -> Option<i64> {
        self.prices
            .get(&territory.id)
            .or_else(|| self.country_defaults.get(&territory.country))
            .copied()
    }
}

/// Tunables for the auction engine.
///
/// The bid increment is a constant unit rather than a percentage so bidding
/// stays granular at every price level.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Fixed amount a new bid must exceed the effective current bid by.
    pub min_increment: i64,
    /// Bonus percent per adjacent territory the bidder already owns.
    pub adjacency_bonus_pct: f64,
    /// Fraction of a country's territories the bidder must own to unlock
    /// the country-control bonus.
    pub country_control_threshold: f64,
    pub country_control_bonus_pct: f64,
    /// Global event multiplier, zero outside event periods.
    pub seasonal_bonus_pct: f64,
    /// Starting bids above this are treated as corrupted when no canonical
    /// price is computable.
    pub sanity_ceiling: i64,
    /// Conservative starting bid used when a corrupted value must be
    /// replaced without a canonical price.
    pub fallback_starting_bid: i64,
    /// Auction length for unowned territories.
    pub unowned_auction_hours: i64,
    /// Auction length for owned territories whose protection has lapsed.
    pub owned_auction_days: i64,
    /// Auction length for protection-extension purchases.
    pub extension_auction_hours: i64,
    /// When false, integrity corrections are applied to the local view only
    /// and never written back (unauthenticated readers).
    pub repair_writes: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            min_increment: 1,
            adjacency_bonus_pct: 5.0,
            country_control_threshold: 0.5,
            country_control_bonus_pct: 10.0,
            seasonal_bonus_pct: 0.0,
            sanity_ceiling: 1_000_000,
            fallback_starting_bid: 100,
            unowned_auction_hours: 24,
            owned_auction_days: 7,
            extension_auction_hours: 24,
            repair_writes: true,
        }
    }
}

impl MarketConfig {
    pub fn read_only() -> Self {
        Self {
            repair_writes: false,
            ..Self::default()
        }
    }
}

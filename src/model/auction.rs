use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::territory::Sovereignty;
use crate::id::{AuctionId, TerritoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuctionKind {
    /// Ownership of the territory goes to the winner.
    Standard,
    /// Owner-only purchase that lengthens an existing protection window.
    ProtectionExtension,
}

string_enum!(AuctionKind {
    Standard => "standard",
    ProtectionExtension => "protection_extension",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Cancelled,
}

string_enum!(AuctionStatus {
    Pending => "pending",
    Active => "active",
    Ended => "ended",
    Cancelled => "cancelled",
});

impl AuctionStatus {
    /// `ended` and `cancelled` never transition out.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Ended | AuctionStatus::Cancelled)
    }
}

/// Protection length the auction winner receives.
///
/// The price multipliers decrease per-day with commitment length, so longer
/// protection is always the better unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProtectionTerm {
    Week,
    Month,
    Year,
    Lifetime,
}

string_enum!(ProtectionTerm {
    Week => "7d",
    Month => "30d",
    Year => "365d",
    Lifetime => "lifetime",
});

impl ProtectionTerm {
    /// `None` for lifetime.
    pub fn days(&self) -> Option<i64> {
        match self {
            ProtectionTerm::Week => Some(7),
            ProtectionTerm::Month => Some(30),
            ProtectionTerm::Year => Some(365),
            ProtectionTerm::Lifetime => None,
        }
    }

    /// Multiplier over market price for a protection-extension purchase.
    pub fn price_multiplier(&self) -> f64 {
        match self {
            ProtectionTerm::Week => 1.0,
            ProtectionTerm::Month => 4.0,
            ProtectionTerm::Year => 50.0,
            ProtectionTerm::Lifetime => 500.0,
        }
    }

    /// Concrete duration; lifetime is 100 years as a practical stand-in.
    pub fn duration(&self) -> Duration {
        match self.days() {
            Some(d) => Duration::days(d),
            None => Duration::days(36_525),
        }
    }

    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration()
    }
}

/// One accepted bid. Immutable once appended to its auction's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder_id: String,
    pub bidder_name: String,
    /// Raw amount, the only value that counts for ranking.
    pub amount: i64,
    /// Buff-adjusted amount, display and audit only.
    pub effective_amount: i64,
    pub placed_at: DateTime<Utc>,
}

/// One bidding event scoped to exactly one territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub territory_id: TerritoryId,
    /// Denormalized for display.
    pub territory_name: String,
    pub country: String,
    pub kind: AuctionKind,
    pub status: AuctionStatus,
    pub starting_bid: i64,
    pub current_bid: i64,
    pub min_increment: i64,
    pub highest_bidder: Option<String>,
    pub highest_bidder_name: Option<String>,
    pub bids: Vec<Bid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// What the eventual winner receives.
    pub protection_term: ProtectionTerm,
    /// True when the auction was created against a territory whose
    /// protection window was still active.
    pub runs_during_protection: bool,
    /// Owner at creation time; used to restore state when nobody bids and
    /// to detect external ownership divergence at finalization.
    pub prior_owner: Option<String>,
    pub prior_owner_name: Option<String>,
    pub prior_sovereignty: Sovereignty,
}

impl Auction {
    /// The live comparison point for a new bid: starting bid while nobody
    /// has bid, else the current bid (never below the starting bid).
    pub fn effective_current_bid(&self) -> i64 {
        if self.highest_bidder.is_none() {
            self.starting_bid
        } else {
            self.current_bid.max(self.starting_bid)
        }
    }

    /// Smallest acceptable next bid.
    pub fn minimum_next_bid(&self) -> i64 {
        self.effective_current_bid() + self.min_increment
    }

    pub fn has_winner(&self) -> bool {
        self.highest_bidder.is_some()
    }

    /// Highest raw amount in the bid history, if any.
    pub fn highest_recorded_amount(&self) -> Option<i64> {
        self.bids.iter().map(|b| b.amount).max()
    }
}

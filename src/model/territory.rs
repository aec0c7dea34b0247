use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AuctionId, TerritoryId};

/// Ownership status of a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Sovereignty {
    /// Never owned, open to instant conquest or a first auction.
    Unconquered,
    /// An auction is running against an unowned territory.
    Contested,
    /// Owned with lapsed protection, open to challenge auctions.
    Ruled,
    /// Owned and inside an active protection window.
    Protected,
}

string_enum!(Sovereignty {
    Unconquered => "unconquered",
    Contested => "contested",
    Ruled => "ruled",
    Protected => "protected",
});

/// One addressable administrative region.
///
/// Mutated only by the auction lifecycle (creation sets the auction pointer,
/// finalization transfers or restores ownership); never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    /// Copy of `id.country()`, denormalized for display.
    pub country: String,
    pub sovereignty: Sovereignty,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub protection_until: Option<DateTime<Utc>>,
    /// At most one in-progress auction per territory.
    pub current_auction: Option<AuctionId>,
}

impl Territory {
    /// A fresh, never-owned territory with no auction running.
    pub fn unconquered(id: TerritoryId, name: impl Into<String>) -> Self {
        let country = id.country().to_string();
        Self {
            id,
            name: name.into(),
            country,
            sovereignty: Sovereignty::Unconquered,
            owner_id: None,
            owner_name: None,
            protection_until: None,
            current_auction: None,
        }
    }

    pub fn is_owned(&self) -> bool {
        self.owner_id.is_some()
    }

    /// True while the owner's title cannot be auctioned away.
    pub fn protection_active(&self, now: DateTime<Utc>) -> bool {
        self.is_owned() && self.protection_until.is_some_and(|until| until > now)
    }

    /// Stored sovereignty with lapsed protection demoted to `Ruled`.
    ///
    /// The stored field is not rewritten when a protection window quietly
    /// expires; readers that care about the live status use this.
    pub fn effective_sovereignty(&self, now: DateTime<Utc>) -> Sovereignty {
        if self.sovereignty == Sovereignty::Protected && !self.protection_active(now) {
            Sovereignty::Ruled
        } else {
            self.sovereignty
        }
    }
}

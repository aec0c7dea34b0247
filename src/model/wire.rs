//! Normalization boundary for loosely-shaped records.
//!
//! Different backends have written auction and territory documents with
//! snake_case or camelCase keys, float or integer amounts, RFC 3339 or
//! unix-millisecond timestamps, and numeric-days or string protection terms.
//! Everything loose is accepted here, exactly once, and converted into the
//! strict model types. Business logic never sees a wire type.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::auction::{Auction, AuctionKind, AuctionStatus, Bid, ProtectionTerm};
use super::territory::{Sovereignty, Territory};
use crate::id::{AuctionId, TerritoryId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wire record rejected: {0}")]
pub struct WireError(pub String);

impl From<String> for WireError {
    fn from(s: String) -> Self {
        WireError(s)
    }
}

/// Timestamps arrive as RFC 3339 strings or unix milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum WireTime {
    Rfc3339(DateTime<Utc>),
    UnixMillis(i64),
}

impl WireTime {
    fn resolve(self) -> Result<DateTime<Utc>, WireError> {
        match self {
            WireTime::Rfc3339(t) => Ok(t),
            WireTime::UnixMillis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| WireError(format!("timestamp out of range: {ms}"))),
        }
    }
}

/// Protection arrives as a term string (`"30d"`), numeric days, or null for
/// lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireProtection {
    Days(i64),
    Term(String),
}

impl WireProtection {
    fn resolve(opt: Option<Self>) -> Result<ProtectionTerm, WireError> {
        match opt {
            None => Ok(ProtectionTerm::Lifetime),
            Some(WireProtection::Days(7)) => Ok(ProtectionTerm::Week),
            Some(WireProtection::Days(30)) => Ok(ProtectionTerm::Month),
            Some(WireProtection::Days(365)) => Ok(ProtectionTerm::Year),
            Some(WireProtection::Days(d)) => {
                Err(WireError(format!("unsupported protection days: {d}")))
            }
            Some(WireProtection::Term(s)) => s.parse().map_err(WireError),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireBid {
    #[serde(alias = "bidderId")]
    pub bidder_id: String,
    #[serde(default, alias = "bidderName")]
    pub bidder_name: String,
    pub amount: f64,
    #[serde(default, alias = "effectiveAmount", alias = "buffedAmount")]
    pub effective_amount: Option<f64>,
    #[serde(alias = "placedAt", alias = "timestamp")]
    pub placed_at: WireTime,
}

impl TryFrom<WireBid> for Bid {
    type Error = WireError;

    fn try_from(w: WireBid) -> Result<Self, Self::Error> {
        let amount = w.amount.round() as i64;
        Ok(Bid {
            bidder_id: w.bidder_id,
            bidder_name: w.bidder_name,
            amount,
            effective_amount: w.effective_amount.map_or(amount, |e| e.round() as i64),
            placed_at: w.placed_at.resolve()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAuction {
    pub id: String,
    #[serde(alias = "territoryId")]
    pub territory_id: String,
    #[serde(default, alias = "territoryName")]
    pub territory_name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    pub status: String,
    #[serde(alias = "startingBid")]
    pub starting_bid: f64,
    #[serde(alias = "currentBid")]
    pub current_bid: f64,
    #[serde(default, alias = "minIncrement", alias = "minBidIncrement")]
    pub min_increment: Option<f64>,
    #[serde(default, alias = "highestBidder")]
    pub highest_bidder: Option<String>,
    #[serde(default, alias = "highestBidderName")]
    pub highest_bidder_name: Option<String>,
    #[serde(default)]
    pub bids: Vec<WireBid>,
    #[serde(alias = "startTime")]
    pub start_time: WireTime,
    #[serde(alias = "endTime")]
    pub end_time: WireTime,
    #[serde(default, alias = "protectionTerm", alias = "protectionDays", alias = "protection_days")]
    pub protection_term: Option<WireProtection>,
    #[serde(default, alias = "runsDuringProtection")]
    pub runs_during_protection: bool,
    #[serde(default, alias = "priorOwner")]
    pub prior_owner: Option<String>,
    #[serde(default, alias = "priorOwnerName")]
    pub prior_owner_name: Option<String>,
    #[serde(default, alias = "priorSovereignty")]
    pub prior_sovereignty: Option<String>,
}

impl TryFrom<WireAuction> for Auction {
    type Error = WireError;

    fn try_from(w: WireAuction) -> Result<Self, Self::Error> {
        let id: AuctionId = w.id.parse().map_err(|e| WireError(format!("{e}")))?;
        let territory_id: TerritoryId = w
            .territory_id
            .parse()
            .map_err(|e| WireError(format!("{e}")))?;
        let kind = match w.kind.as_deref() {
            None => AuctionKind::Standard,
            Some(s) => s.parse().map_err(WireError)?,
        };
        let status: AuctionStatus = w.status.parse().map_err(WireError)?;
        let prior_sovereignty = match w.prior_sovereignty.as_deref() {
            None => Sovereignty::Unconquered,
            Some(s) => s.parse().map_err(WireError)?,
        };
        let bids = w
            .bids
            .into_iter()
            .map(Bid::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let country = w
            .country
            .unwrap_or_else(|| territory_id.country().to_string());
        Ok(Auction {
            id,
            territory_id,
            territory_name: w.territory_name,
            country,
            kind,
            status,
            starting_bid: w.starting_bid.round() as i64,
            current_bid: w.current_bid.round() as i64,
            min_increment: w.min_increment.map_or(1, |m| m.round() as i64),
            highest_bidder: w.highest_bidder,
            highest_bidder_name: w.highest_bidder_name,
            bids,
            start_time: w.start_time.resolve()?,
            end_time: w.end_time.resolve()?,
            protection_term: WireProtection::resolve(w.protection_term)?,
            runs_during_protection: w.runs_during_protection,
            prior_owner: w.prior_owner,
            prior_owner_name: w.prior_owner_name,
            prior_sovereignty,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTerritory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub sovereignty: String,
    #[serde(default, alias = "ownerId", alias = "ruler")]
    pub owner_id: Option<String>,
    #[serde(default, alias = "ownerName", alias = "rulerName")]
    pub owner_name: Option<String>,
    #[serde(
        default,
        alias = "protectionUntil",
        alias = "protectionExpiry",
        alias = "protection_expiry"
    )]
    pub protection_until: Option<WireTime>,
    #[serde(default, alias = "currentAuction")]
    pub current_auction: Option<String>,
}

impl TryFrom<WireTerritory> for Territory {
    type Error = WireError;

    fn try_from(w: WireTerritory) -> Result<Self, Self::Error> {
        let id: TerritoryId = w.id.parse().map_err(|e| WireError(format!("{e}")))?;
        let sovereignty: Sovereignty = w.sovereignty.parse().map_err(WireError)?;
        let current_auction = w
            .current_auction
            .map(|s| s.parse::<AuctionId>())
            .transpose()
            .map_err(|e| WireError(format!("{e}")))?;
        let protection_until = w.protection_until.map(WireTime::resolve).transpose()?;
        let country = w.country.unwrap_or_else(|| id.country().to_string());
        Ok(Territory {
            id,
            name: w.name,
            country,
            sovereignty,
            owner_id: w.owner_id,
            owner_name: w.owner_name,
            protection_until,
            current_auction,
        })
    }
}

/// Normalize a loose auction document into the strict type.
pub fn auction_from_value(value: serde_json::Value) -> Result<Auction, WireError> {
    let wire: WireAuction =
        serde_json::from_value(value).map_err(|e| WireError(format!("auction decode: {e}")))?;
    Auction::try_from(wire)
}

/// Normalize a loose territory document into the strict type.
pub fn territory_from_value(value: serde_json::Value) -> Result<Territory, WireError> {
    let wire: WireTerritory =
        serde_json::from_value(value).map_err(|e| WireError(format!("territory decode: {e}")))?;
    Territory::try_from(wire)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn camel_case_auction_normalizes() {
        let auction = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territoryId": "USA-06075",
            "territoryName": "San Francisco",
            "type": "standard",
            "status": "active",
            "startingBid": 100.0,
            "currentBid": 150,
            "highestBidder": "u1",
            "highestBidderName": "One",
            "startTime": 1724800000000_i64,
            "endTime": "2024-08-29T00:26:40Z",
            "protectionDays": 30,
            "bids": [
                {"bidderId": "u1", "bidderName": "One", "amount": 150.0, "timestamp": 1724800100000_i64}
            ]
        }))
        .unwrap();

        assert_eq!(auction.territory_id.to_string(), "USA-06075");
        assert_eq!(auction.kind, AuctionKind::Standard);
        assert_eq!(auction.starting_bid, 100);
        assert_eq!(auction.current_bid, 150);
        assert_eq!(auction.min_increment, 1);
        assert_eq!(auction.protection_term, ProtectionTerm::Month);
        assert_eq!(auction.bids.len(), 1);
        assert_eq!(auction.bids[0].amount, 150);
        // effective defaults to raw when the legacy record lacks it
        assert_eq!(auction.bids[0].effective_amount, 150);
    }

    #[test]
    fn snake_case_auction_normalizes_to_same_record() {
        let camel = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territoryId": "USA-06075",
            "territoryName": "San Francisco",
            "status": "active",
            "startingBid": 100,
            "currentBid": 100,
            "startTime": "2024-08-28T00:26:40Z",
            "endTime": "2024-08-29T00:26:40Z",
        }))
        .unwrap();
        let snake = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territory_id": "USA-06075",
            "territory_name": "San Francisco",
            "status": "active",
            "starting_bid": 100,
            "current_bid": 100,
            "start_time": "2024-08-28T00:26:40Z",
            "end_time": "2024-08-29T00:26:40Z",
        }))
        .unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn missing_protection_means_lifetime() {
        let auction = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territory_id": "USA-06075",
            "status": "active",
            "starting_bid": 100,
            "current_bid": 100,
            "start_time": "2024-08-28T00:26:40Z",
            "end_time": "2024-08-29T00:26:40Z",
        }))
        .unwrap();
        assert_eq!(auction.protection_term, ProtectionTerm::Lifetime);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territory_id": "USA-06075",
            "status": "smoldering",
            "starting_bid": 100,
            "current_bid": 100,
            "start_time": "2024-08-28T00:26:40Z",
            "end_time": "2024-08-29T00:26:40Z",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("AuctionStatus"));
    }

    #[test]
    fn unsupported_protection_days_rejected() {
        let err = auction_from_value(json!({
            "id": "USA-06075-1724800000",
            "territory_id": "USA-06075",
            "status": "active",
            "starting_bid": 100,
            "current_bid": 100,
            "start_time": "2024-08-28T00:26:40Z",
            "end_time": "2024-08-29T00:26:40Z",
            "protection_days": 90,
        }))
        .unwrap_err();
        assert!(err.to_string().contains("protection days"));
    }

    #[test]
    fn legacy_ruler_field_maps_to_owner() {
        let territory = territory_from_value(json!({
            "id": "USA-06075",
            "name": "San Francisco",
            "sovereignty": "protected",
            "ruler": "u1",
            "rulerName": "One",
            "protectionExpiry": "2025-01-01T00:00:00Z",
            "currentAuction": "USA-06075-1724800000",
        }))
        .unwrap();
        assert_eq!(territory.owner_id.as_deref(), Some("u1"));
        assert_eq!(territory.owner_name.as_deref(), Some("One"));
        assert!(territory.protection_until.is_some());
        assert_eq!(
            territory.current_auction.unwrap().to_string(),
            "USA-06075-1724800000"
        );
    }

    #[test]
    fn country_derived_from_id_when_missing() {
        let territory = territory_from_value(json!({
            "id": "FRA-75",
            "name": "Paris",
            "sovereignty": "unconquered",
        }))
        .unwrap();
        assert_eq!(territory.country, "FRA");
    }
}

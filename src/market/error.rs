use thiserror::Error;

use crate::id::{AuctionId, IdError, TerritoryId};
use crate::model::WireError;

/// Every failure the engine surfaces to callers.
///
/// Validation errors and `TransactionConflict` are never retried internally:
/// the caller re-reads authoritative state and resubmits with fresh data.
/// `StoreUnavailable` is fail-fast: the engine never retries against a
/// store that is rejecting writes.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("bid too low: minimum acceptable bid is {minimum}")]
    InvalidBid { minimum: i64 },
    #[error("auction {0} not found")]
    AuctionNotFound(AuctionId),
    #[error("auction {0} is not active")]
    AuctionNotActive(AuctionId),
    #[error("territory {0} already has an auction in progress")]
    AuctionInProgress(TerritoryId),
    #[error("cannot resolve a country context for {0:?}")]
    MissingCountryContext(String),
    #[error("territory {0} not found")]
    TerritoryNotFound(TerritoryId),
    #[error("territory {0} is already owned")]
    TerritoryAlreadyOwned(TerritoryId),
    #[error("only the current owner may run this operation on {0}")]
    NotTerritoryOwner(TerritoryId),
    #[error("no market price available for territory {0}")]
    PriceUnavailable(TerritoryId),
    #[error("stored auction state changed underneath this write; re-read and resubmit")]
    TransactionConflict,
    #[error("stored record failed normalization")]
    CorruptRecord(#[from] WireError),
    #[error("authoritative store unavailable")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl From<IdError> for MarketError {
    fn from(e: IdError) -> Self {
        match &e {
            IdError::BadCountryCode(raw) => MarketError::MissingCountryContext(raw.clone()),
            _ => MarketError::MissingCountryContext(e.to_string()),
        }
    }
}

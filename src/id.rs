use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("country code must be exactly 3 ASCII letters, got {0:?}")]
    BadCountryCode(String),
    #[error("administrative code cannot be empty")]
    EmptyAdminCode,
    #[error("malformed id: {0:?}")]
    Malformed(String),
}

/// Stable identifier for one administrative region: a 3-letter country code
/// plus the region's administrative code, rendered `"USA-06075"`.
///
/// The country code is the disambiguation context: two identically-named
/// regions in different countries get distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TerritoryId {
    country: String,
    code: String,
}

impl TerritoryId {
    pub fn new(country: &str, code: &str) -> Result<Self, IdError> {
        if country.len() != 3 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(IdError::BadCountryCode(country.to_string()));
        }
        if code.is_empty() {
            return Err(IdError::EmptyAdminCode);
        }
        Ok(Self {
            country: country.to_ascii_uppercase(),
            code: code.to_string(),
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.country, self.code)
    }
}

impl From<TerritoryId> for String {
    fn from(id: TerritoryId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TerritoryId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (country, code) = s
            .split_once('-')
            .ok_or_else(|| IdError::Malformed(s.clone()))?;
        Self::new(country, code)
    }
}

impl std::str::FromStr for TerritoryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// Identifier for one auction, derived from its territory plus the creation
/// time: `"USA-06075-1724800000"` (unix seconds). One territory can host at
/// most one in-progress auction, so the pair is unique in practice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AuctionId {
    territory: TerritoryId,
    created_unix: i64,
}

impl AuctionId {
    pub fn new(territory: &TerritoryId, created_at: DateTime<Utc>) -> Self {
        Self {
            territory: territory.clone(),
            created_unix: created_at.timestamp(),
        }
    }

    pub fn territory(&self) -> &TerritoryId {
        &self.territory
    }

    /// Creation instant; out-of-range seconds clamp to the unix epoch.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_unix, 0).unwrap_or_default()
    }
}

impl std::fmt::Display for AuctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.territory, self.created_unix)
    }
}

impl From<AuctionId> for String {
    fn from(id: AuctionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AuctionId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (territory, unix) = s
            .rsplit_once('-')
            .ok_or_else(|| IdError::Malformed(s.clone()))?;
        let created_unix: i64 = unix.parse().map_err(|_| IdError::Malformed(s.clone()))?;
        let territory: TerritoryId = territory.parse()?;
        Ok(Self {
            territory,
            created_unix,
        })
    }
}

impl std::str::FromStr for AuctionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

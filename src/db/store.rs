use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::id::{AuctionId, TerritoryId};
use crate::market::buffs::CountryHoldings;
use crate::market::error::MarketError;
use crate::market::finalize::{Finalization, apply_plan, plan_finalization};
use crate::market::integrity::AuctionRepair;
use crate::model::{
    Auction, AuctionKind, AuctionStatus, Bid, ProtectionTerm, Sovereignty, Territory, WireError,
};
use crate::store::AuctionStore;

/// Postgres-backed `AuctionStore`.
///
/// The atomic read-modify-write contract is met with transactions plus
/// `SELECT ... FOR UPDATE` row locks: the live record is re-read and
/// re-validated under the lock before any write, so at-most-one-winner
/// holds across concurrent clients.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

const AUCTION_COLS: &str = "id, territory_id, territory_name, country, kind, status, \
     starting_bid, current_bid, min_increment, highest_bidder, highest_bidder_name, \
     start_time, end_time, protection_term, runs_during_protection, \
     prior_owner, prior_owner_name, prior_sovereignty";

const TERRITORY_COLS: &str =
    "id, name, country, sovereignty, owner_id, owner_name, protection_until, current_auction";

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a bidirectional adjacency edge (registry seeding).
    pub async fn add_adjacency(
        &self,
        a: &TerritoryId,
        b: &TerritoryId,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO territory_adjacency (territory_id, neighbor_id)
             VALUES ($1, $2), ($2, $1)
             ON CONFLICT DO NOTHING",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_bids(
        tx: &mut Transaction<'_, Postgres>,
        auction_id: &AuctionId,
    ) -> Result<Vec<Bid>, MarketError> {
        let rows = sqlx::query(
            "SELECT bidder_id, bidder_name, amount, effective_amount, placed_at
             FROM auction_bids WHERE auction_id = $1 ORDER BY seq",
        )
        .bind(auction_id.to_string())
        .fetch_all(&mut **tx)
        .await?;
        rows.iter().map(bid_from_row).collect()
    }

    /// Read an auction with its bid history, locking the auction row when
    /// `lock` is set.
    async fn fetch_auction(
        tx: &mut Transaction<'_, Postgres>,
        id: &AuctionId,
        lock: bool,
    ) -> Result<Option<Auction>, MarketError> {
        let suffix = if lock { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {AUCTION_COLS} FROM auctions WHERE id = $1{suffix}");
        let Some(row) = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await?
        else {
            return Ok(None);
        };
        let bids = Self::load_bids(tx, id).await?;
        Ok(Some(auction_from_row(&row, bids)?))
    }

    async fn fetch_territory(
        tx: &mut Transaction<'_, Postgres>,
        id: &TerritoryId,
        lock: bool,
    ) -> Result<Option<Territory>, MarketError> {
        let suffix = if lock { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {TERRITORY_COLS} FROM territories WHERE id = $1{suffix}");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(territory_from_row).transpose()
    }

    async fn write_territory(
        tx: &mut Transaction<'_, Postgres>,
        territory: &Territory,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE territories SET name = $2, country = $3, sovereignty = $4,
                 owner_id = $5, owner_name = $6, protection_until = $7, current_auction = $8
             WHERE id = $1",
        )
        .bind(territory.id.to_string())
        .bind(&territory.name)
        .bind(&territory.country)
        .bind(territory.sovereignty.as_str())
        .bind(&territory.owner_id)
        .bind(&territory.owner_name)
        .bind(territory.protection_until)
        .bind(territory.current_auction.as_ref().map(|a| a.to_string()))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

impl AuctionStore for PgStore {
    async fn territory(&self, id: &TerritoryId) -> Result<Option<Territory>, MarketError> {
        let sql = format!("SELECT {TERRITORY_COLS} FROM territories WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(territory_from_row).transpose()
    }

    async fn auction(&self, id: &AuctionId) -> Result<Option<Auction>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let auction = Self::fetch_auction(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(auction)
    }

    async fn active_auction_for(
        &self,
        territory: &TerritoryId,
    ) -> Result<Option<Auction>, MarketError> {
        let sql = format!(
            "SELECT {AUCTION_COLS} FROM auctions
             WHERE territory_id = $1 AND status = 'active' LIMIT 1"
        );
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query(&sql)
            .bind(territory.to_string())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: AuctionId = parse_id(row.try_get::<String, _>("id")?)?;
        let bids = Self::load_bids(&mut tx, &id).await?;
        let auction = auction_from_row(&row, bids)?;
        tx.commit().await?;
        Ok(Some(auction))
    }

    async fn active_auctions(&self) -> Result<Vec<Auction>, MarketError> {
        let sql = format!(
            "SELECT {AUCTION_COLS} FROM auctions WHERE status = 'active' ORDER BY id"
        );
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;
        let mut auctions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: AuctionId = parse_id(row.try_get::<String, _>("id")?)?;
            let bids = Self::load_bids(&mut tx, &id).await?;
            auctions.push(auction_from_row(row, bids)?);
        }
        tx.commit().await?;
        Ok(auctions)
    }

    async fn neighbors(&self, territory: &TerritoryId) -> Result<Vec<TerritoryId>, MarketError> {
        let rows = sqlx::query(
            "SELECT neighbor_id FROM territory_adjacency
             WHERE territory_id = $1 ORDER BY neighbor_id",
        )
        .bind(territory.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| parse_id(row.try_get::<String, _>("neighbor_id")?))
            .collect()
    }

    async fn country_holdings(
        &self,
        country: &str,
        owner_id: &str,
    ) -> Result<CountryHoldings, MarketError> {
        let row = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE owner_id = $2) AS owned, COUNT(*) AS total
             FROM territories WHERE country = $1",
        )
        .bind(country)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(CountryHoldings {
            owned: row.try_get::<i64, _>("owned")? as u32,
            total: row.try_get::<i64, _>("total")? as u32,
        })
    }

    async fn put_territory(&self, territory: &Territory) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO territories
                 (id, name, country, sovereignty, owner_id, owner_name,
                  protection_until, current_auction)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name, country = EXCLUDED.country,
                 sovereignty = EXCLUDED.sovereignty, owner_id = EXCLUDED.owner_id,
                 owner_name = EXCLUDED.owner_name,
                 protection_until = EXCLUDED.protection_until,
                 current_auction = EXCLUDED.current_auction",
        )
        .bind(territory.id.to_string())
        .bind(&territory.name)
        .bind(&territory.country)
        .bind(territory.sovereignty.as_str())
        .bind(&territory.owner_id)
        .bind(&territory.owner_name)
        .bind(territory.protection_until)
        .bind(territory.current_auction.as_ref().map(|a| a.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_auction(
        &self,
        auction: &Auction,
        territory: &Territory,
    ) -> Result<(), MarketError> {
        let mut tx = self.pool.begin().await?;
        let live = Self::fetch_territory(&mut tx, &auction.territory_id, true)
            .await?
            .ok_or_else(|| MarketError::TerritoryNotFound(auction.territory_id.clone()))?;
        if live.current_auction.is_some() {
            return Err(MarketError::AuctionInProgress(auction.territory_id.clone()));
        }
        let active_exists = sqlx::query(
            "SELECT 1 AS one FROM auctions WHERE territory_id = $1 AND status = 'active'",
        )
        .bind(auction.territory_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        if active_exists.is_some() {
            return Err(MarketError::AuctionInProgress(auction.territory_id.clone()));
        }

        sqlx::query(
            "INSERT INTO auctions
                 (id, territory_id, territory_name, country, kind, status,
                  starting_bid, current_bid, min_increment, highest_bidder,
                  highest_bidder_name, start_time, end_time, protection_term,
                  runs_during_protection, prior_owner, prior_owner_name,
                  prior_sovereignty)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                     $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(auction.id.to_string())
        .bind(auction.territory_id.to_string())
        .bind(&auction.territory_name)
        .bind(&auction.country)
        .bind(auction.kind.as_str())
        .bind(auction.status.as_str())
        .bind(auction.starting_bid)
        .bind(auction.current_bid)
        .bind(auction.min_increment)
        .bind(&auction.highest_bidder)
        .bind(&auction.highest_bidder_name)
        .bind(auction.start_time)
        .bind(auction.end_time)
        .bind(auction.protection_term.as_str())
        .bind(auction.runs_during_protection)
        .bind(&auction.prior_owner)
        .bind(&auction.prior_owner_name)
        .bind(auction.prior_sovereignty.as_str())
        .execute(&mut *tx)
        .await?;
        Self::write_territory(&mut tx, territory).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_bid(&self, id: &AuctionId, bid: Bid) -> Result<Auction, MarketError> {
        let mut tx = self.pool.begin().await?;
        let mut auction = Self::fetch_auction(&mut tx, id, true)
            .await?
            .ok_or_else(|| MarketError::AuctionNotFound(id.clone()))?;
        if auction.status != AuctionStatus::Active {
            return Err(MarketError::AuctionNotActive(id.clone()));
        }
        // re-validate under the row lock: a racing writer may have raised
        // the floor after the caller's read
        if bid.amount < auction.minimum_next_bid() {
            return Err(MarketError::TransactionConflict);
        }

        sqlx::query(
            "UPDATE auctions SET current_bid = $2, highest_bidder = $3,
                 highest_bidder_name = $4
             WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(bid.amount)
        .bind(&bid.bidder_id)
        .bind(&bid.bidder_name)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO auction_bids
                 (auction_id, seq, bidder_id, bidder_name, amount,
                  effective_amount, placed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id.to_string())
        .bind(auction.bids.len() as i32)
        .bind(&bid.bidder_id)
        .bind(&bid.bidder_name)
        .bind(bid.amount)
        .bind(bid.effective_amount)
        .bind(bid.placed_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        auction.current_bid = bid.amount;
        auction.highest_bidder = Some(bid.bidder_id.clone());
        auction.highest_bidder_name = Some(bid.bidder_name.clone());
        auction.bids.push(bid);
        Ok(auction)
    }

    async fn finalize_auction(
        &self,
        id: &AuctionId,
        now: DateTime<Utc>,
    ) -> Result<Finalization, MarketError> {
        let mut tx = self.pool.begin().await?;
        let mut auction = Self::fetch_auction(&mut tx, id, true)
            .await?
            .ok_or_else(|| MarketError::AuctionNotFound(id.clone()))?;
        let mut territory = Self::fetch_territory(&mut tx, &auction.territory_id, true)
            .await?
            .ok_or_else(|| MarketError::TerritoryNotFound(auction.territory_id.clone()))?;

        let plan = plan_finalization(&auction, &territory, now);
        apply_plan(&plan, &mut auction, &mut territory);

        sqlx::query("UPDATE auctions SET status = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(auction.status.as_str())
            .execute(&mut *tx)
            .await?;
        Self::write_territory(&mut tx, &territory).await?;
        tx.commit().await?;
        Ok(Finalization {
            plan,
            auction,
            territory,
        })
    }

    async fn grant_ownership(
        &self,
        territory: &TerritoryId,
        owner_id: &str,
        owner_name: &str,
        protection_until: DateTime<Utc>,
    ) -> Result<Territory, MarketError> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::fetch_territory(&mut tx, territory, true)
            .await?
            .ok_or_else(|| MarketError::TerritoryNotFound(territory.clone()))?;
        if record.owner_id.is_some() {
            return Err(MarketError::TerritoryAlreadyOwned(territory.clone()));
        }
        if record.current_auction.is_some() {
            return Err(MarketError::AuctionInProgress(territory.clone()));
        }
        record.owner_id = Some(owner_id.to_string());
        record.owner_name = Some(owner_name.to_string());
        record.sovereignty = Sovereignty::Protected;
        record.protection_until = Some(protection_until);
        Self::write_territory(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn repair_auction(
        &self,
        id: &AuctionId,
        repair: &AuctionRepair,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE auctions SET
                 starting_bid = COALESCE($2, starting_bid),
                 current_bid = COALESCE($3, current_bid)
             WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(repair.starting_bid)
        .bind(repair.current_bid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_id<T: std::str::FromStr>(raw: String) -> Result<T, MarketError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| MarketError::CorruptRecord(WireError(format!("{e}"))))
}

fn bid_from_row(row: &PgRow) -> Result<Bid, MarketError> {
    Ok(Bid {
        bidder_id: row.try_get("bidder_id")?,
        bidder_name: row.try_get("bidder_name")?,
        amount: row.try_get("amount")?,
        effective_amount: row.try_get("effective_amount")?,
        placed_at: row.try_get("placed_at")?,
    })
}

fn territory_from_row(row: &PgRow) -> Result<Territory, MarketError> {
    Ok(Territory {
        id: parse_id(row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        country: row.try_get::<String, _>("country")?.trim_end().to_string(),
        sovereignty: parse_id::<Sovereignty>(row.try_get::<String, _>("sovereignty")?)?,
        owner_id: row.try_get("owner_id")?,
        owner_name: row.try_get("owner_name")?,
        protection_until: row.try_get("protection_until")?,
        current_auction: row
            .try_get::<Option<String>, _>("current_auction")?
            .map(parse_id::<AuctionId>)
            .transpose()?,
    })
}

fn auction_from_row(row: &PgRow, bids: Vec<Bid>) -> Result<Auction, MarketError> {
    Ok(Auction {
        id: parse_id(row.try_get::<String, _>("id")?)?,
        territory_id: parse_id(row.try_get::<String, _>("territory_id")?)?,
        territory_name: row.try_get("territory_name")?,
        country: row.try_get::<String, _>("country")?.trim_end().to_string(),
        kind: parse_id::<AuctionKind>(row.try_get::<String, _>("kind")?)?,
        status: parse_id::<AuctionStatus>(row.try_get::<String, _>("status")?)?,
        starting_bid: row.try_get("starting_bid")?,
        current_bid: row.try_get("current_bid")?,
        min_increment: row.try_get("min_increment")?,
        highest_bidder: row.try_get("highest_bidder")?,
        highest_bidder_name: row.try_get("highest_bidder_name")?,
        bids,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        protection_term: parse_id::<ProtectionTerm>(row.try_get::<String, _>("protection_term")?)?,
        runs_during_protection: row.try_get("runs_during_protection")?,
        prior_owner: row.try_get("prior_owner")?,
        prior_owner_name: row.try_get("prior_owner_name")?,
        prior_sovereignty: parse_id::<Sovereignty>(
            row.try_get::<String, _>("prior_sovereignty")?,
        )?,
    })
}

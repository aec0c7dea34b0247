use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::buffs::{AppliedBuff, compute_effective_amount};
use super::cache::AuctionCache;
use super::config::MarketConfig;
use super::error::MarketError;
use super::finalize::{Finalization, FinalizationPlan};
use super::integrity::reconcile;
use super::pricing::{PricingOracle, canonical_starting_bid};
use super::signal::MarketSignal;
use crate::id::{AuctionId, TerritoryId};
use crate::model::{
    Auction, AuctionKind, AuctionStatus, Bid, ProtectionTerm, Sovereignty, Territory,
};
use crate::store::AuctionStore;

/// Options for auction creation.
#[derive(Debug, Clone)]
pub struct CreateAuctionOptions {
    /// Protection the eventual winner receives. Defaults to lifetime.
    pub protection_term: ProtectionTerm,
    /// Override for the fixed bid increment.
    pub min_increment: Option<i64>,
    /// Identity of the requesting user, enforced for owner-only operations.
    pub requested_by: Option<String>,
}

impl Default for CreateAuctionOptions {
    fn default() -> Self {
        Self {
            protection_term: ProtectionTerm::Lifetime,
            min_increment: None,
            requested_by: None,
        }
    }
}

/// What the caller gets back from an accepted bid.
#[derive(Debug, Clone)]
pub struct BidReceipt {
    /// The authoritative post-commit auction record.
    pub auction: Auction,
    /// Buff-adjusted display amount.
    pub effective_amount: i64,
    pub applied_buffs: Vec<AppliedBuff>,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub ended: Vec<AuctionId>,
    pub failed: Vec<AuctionId>,
}

/// The auction and ownership-transfer engine.
///
/// Owns a best-effort cache of active auctions and an outbox of committed
/// signals; all correctness-critical mutation happens inside the store's
/// transactions. One engine per client instance; cross-client ordering is
/// whatever the store's conflict checks enforce.
pub struct AuctionEngine<S, P> {
    store: S,
    oracle: P,
    config: MarketConfig,
    cache: AuctionCache,
    signals: Vec<MarketSignal>,
}

impl<S: AuctionStore, P: PricingOracle> AuctionEngine<S, P> {
    pub fn new(store: S, oracle: P, config: MarketConfig) -> Self {
        Self {
            store,
            oracle,
            config,
            cache: AuctionCache::new(),
            signals: Vec::new(),
        }
    }

    pub fn cache(&self) -> &AuctionCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand accumulated signals to the embedding layer.
    pub fn drain_signals(&mut self) -> Vec<MarketSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Rebuild the cache from the store's active auctions (startup, or
    /// recovery after a failed write left local state suspect).
    pub async fn refresh_cache(&mut self) -> Result<(), MarketError> {
        let auctions = self.store.active_auctions().await?;
        self.cache.clear();
        for auction in auctions {
            self.cache.apply(auction);
        }
        Ok(())
    }

    /// Validate and commit one bid.
    ///
    /// Ranking always uses the raw amount; the buffed amount is carried on
    /// the bid record for display and audit only. On `TransactionConflict`
    /// the caller must re-read and resubmit; the engine never retries a
    /// financial write on its own.
    pub async fn place_bid(
        &mut self,
        auction_id: &AuctionId,
        bidder_id: &str,
        bidder_name: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<BidReceipt, MarketError> {
        let mut auction = self
            .store
            .auction(auction_id)
            .await?
            .ok_or_else(|| MarketError::AuctionNotFound(auction_id.clone()))?;
        if auction.status != AuctionStatus::Active || auction.end_time <= now {
            return Err(MarketError::AuctionNotActive(auction_id.clone()));
        }
        if amount <= 0 {
            return Err(MarketError::InvalidBid {
                minimum: auction.minimum_next_bid(),
            });
        }

        // sanity-check the stored record before validating against it
        let territory = self.store.territory(&auction.territory_id).await?;
        let canonical = territory.as_ref().and_then(|t| {
            self.oracle
                .market_price(t)
                .map(|p| canonical_starting_bid(auction.kind, auction.protection_term, p))
        });
        if let Some(repair) = reconcile(&auction, canonical, &self.config) {
            if self.config.repair_writes {
                warn!(auction = %auction.id, ?repair, "repairing corrupted auction record");
                self.store.repair_auction(&auction.id, &repair).await?;
            }
            repair.apply_to(&mut auction);
        }

        let minimum = auction.minimum_next_bid();
        if amount < minimum {
            return Err(MarketError::InvalidBid { minimum });
        }

        let buffed = match territory.as_ref() {
            Some(territory) => {
                let owned_neighbors = self.owned_neighbor_count(territory, bidder_id).await?;
                let holdings = self
                    .store
                    .country_holdings(&territory.country, bidder_id)
                    .await?;
                compute_effective_amount(amount, owned_neighbors, holdings, &self.config)
            }
            None => compute_effective_amount(amount, 0, Default::default(), &self.config),
        };

        let bid = Bid {
            bidder_id: bidder_id.to_string(),
            bidder_name: bidder_name.to_string(),
            amount,
            effective_amount: buffed.effective,
            placed_at: now,
        };
        // the store re-validates inside its transaction; a racing writer
        // surfaces here as TransactionConflict
        let committed = self.store.commit_bid(auction_id, bid).await?;

        // cache only ever learns from the transaction's return value
        self.cache.apply(committed.clone());
        self.signals.push(MarketSignal::AuctionUpdated {
            auction_id: committed.id.clone(),
            territory_id: committed.territory_id.clone(),
            current_bid: committed.current_bid,
            bidder_id: bidder_id.to_string(),
            bidder_name: bidder_name.to_string(),
            effective_amount: buffed.effective,
        });

        Ok(BidReceipt {
            auction: committed,
            effective_amount: buffed.effective,
            applied_buffs: buffed.applied,
        })
    }

    /// Authoritative read with integrity corrections applied.
    ///
    /// When repair writes are disabled (unauthenticated readers) the
    /// corrections patch only the returned view, so the caller still sees
    /// sane numbers without an unauthorized write attempt.
    pub async fn view_auction(&self, auction_id: &AuctionId) -> Result<Auction, MarketError> {
        let mut auction = self
            .store
            .auction(auction_id)
            .await?
            .ok_or_else(|| MarketError::AuctionNotFound(auction_id.clone()))?;
        let territory = self.store.territory(&auction.territory_id).await?;
        let canonical = territory.as_ref().and_then(|t| {
            self.oracle
                .market_price(t)
                .map(|p| canonical_starting_bid(auction.kind, auction.protection_term, p))
        });
        if let Some(repair) = reconcile(&auction, canonical, &self.config) {
            if self.config.repair_writes {
                warn!(auction = %auction.id, ?repair, "repairing corrupted auction record");
                self.store.repair_auction(&auction.id, &repair).await?;
            }
            repair.apply_to(&mut auction);
        }
        Ok(auction)
    }

    /// Create a standard auction against a territory.
    pub async fn create_auction(
        &mut self,
        territory_id: &TerritoryId,
        options: CreateAuctionOptions,
        now: DateTime<Utc>,
    ) -> Result<Auction, MarketError> {
        let territory = self.require_territory(territory_id).await?;
        self.ensure_no_auction(&territory).await?;

        let price = self
            .oracle
            .market_price(&territory)
            .ok_or_else(|| MarketError::PriceUnavailable(territory_id.clone()))?;
        let starting_bid = canonical_starting_bid(
            AuctionKind::Standard,
            options.protection_term,
            price,
        );

        let runs_during_protection = territory.protection_active(now);
        let end_time = if runs_during_protection {
            // challenges against protected land settle exactly when the
            // protection lapses
            territory.protection_until.unwrap_or(now)
        } else if territory.is_owned() {
            now + Duration::days(self.config.owned_auction_days)
        } else {
            now + Duration::hours(self.config.unowned_auction_hours)
        };

        let auction = self.build_auction(
            &territory,
            AuctionKind::Standard,
            options,
            starting_bid,
            now,
            end_time,
            runs_during_protection,
        );
        self.persist_new_auction(auction, territory).await
    }

    /// Owner-only purchase auction that lengthens a protection window.
    pub async fn create_protection_extension_auction(
        &mut self,
        territory_id: &TerritoryId,
        term: ProtectionTerm,
        mut options: CreateAuctionOptions,
        now: DateTime<Utc>,
    ) -> Result<Auction, MarketError> {
        let territory = self.require_territory(territory_id).await?;
        let Some(owner) = territory.owner_id.as_deref() else {
            return Err(MarketError::NotTerritoryOwner(territory_id.clone()));
        };
        if let Some(requested_by) = options.requested_by.as_deref()
            && requested_by != owner
        {
            return Err(MarketError::NotTerritoryOwner(territory_id.clone()));
        }
        self.ensure_no_auction(&territory).await?;

        let price = self
            .oracle
            .market_price(&territory)
            .ok_or_else(|| MarketError::PriceUnavailable(territory_id.clone()))?;
        let starting_bid =
            canonical_starting_bid(AuctionKind::ProtectionExtension, term, price);
        let end_time = now + Duration::hours(self.config.extension_auction_hours);
        let runs_during_protection = territory.protection_active(now);

        options.protection_term = term;
        let auction = self.build_auction(
            &territory,
            AuctionKind::ProtectionExtension,
            options,
            starting_bid,
            now,
            end_time,
            runs_during_protection,
        );
        self.persist_new_auction(auction, territory).await
    }

    /// Finalize an auction exactly once. Safe to call repeatedly and safe
    /// to retry after `StoreUnavailable`: the store-side terminal check
    /// makes re-application a no-op.
    pub async fn end_auction(
        &mut self,
        auction_id: &AuctionId,
        now: DateTime<Utc>,
    ) -> Result<Finalization, MarketError> {
        let finalization = self.store.finalize_auction(auction_id, now).await?;
        self.cache.remove(auction_id);
        if finalization.already_ended() {
            return Ok(finalization);
        }

        let auction = &finalization.auction;
        self.signals.push(MarketSignal::AuctionEnded {
            auction_id: auction.id.clone(),
            territory_id: auction.territory_id.clone(),
            winner_id: auction.highest_bidder.clone(),
            amount: auction.has_winner().then_some(auction.current_bid),
        });

        match &finalization.plan {
            FinalizationPlan::TransferOwnership {
                winner_id,
                winner_name,
                amount,
                ..
            }
            | FinalizationPlan::ExtendProtection {
                winner_id,
                winner_name,
                amount,
                ..
            } => {
                info!(
                    territory = %auction.territory_id,
                    owner = %winner_id,
                    amount,
                    "ownership granted by auction"
                );
                self.signals.push(MarketSignal::OwnershipTransferred {
                    territory_id: auction.territory_id.clone(),
                    owner_id: winner_id.clone(),
                    owner_name: winner_name.clone(),
                    amount_paid: *amount,
                    via_auction: true,
                });
            }
            FinalizationPlan::SkipDivergedOwnership => {
                warn!(
                    auction = %auction.id,
                    territory = %auction.territory_id,
                    "ownership diverged externally; transfer skipped"
                );
            }
            FinalizationPlan::Revert | FinalizationPlan::AlreadyEnded => {}
        }
        Ok(finalization)
    }

    /// Immediate, auction-free ownership grant.
    pub async fn instant_conquest(
        &mut self,
        territory_id: &TerritoryId,
        bidder_id: &str,
        bidder_name: &str,
        amount: i64,
        term: ProtectionTerm,
        now: DateTime<Utc>,
    ) -> Result<Territory, MarketError> {
        if amount <= 0 {
            return Err(MarketError::InvalidBid { minimum: 1 });
        }
        let territory = self
            .store
            .grant_ownership(territory_id, bidder_id, bidder_name, term.expiry_from(now))
            .await?;
        info!(territory = %territory_id, owner = %bidder_id, amount, "instant conquest");
        self.signals.push(MarketSignal::OwnershipTransferred {
            territory_id: territory_id.clone(),
            owner_id: bidder_id.to_string(),
            owner_name: bidder_name.to_string(),
            amount_paid: amount,
            via_auction: false,
        });
        Ok(territory)
    }

    /// Finalize every cached auction whose end time has passed.
    ///
    /// Each auction is processed independently; a failure is logged and
    /// counted without blocking the rest. Advisory only: any caller may
    /// invoke `end_auction` directly, so finalization never depends on the
    /// sweep being scheduled.
    pub async fn sweep_expired(&mut self, now: DateTime<Utc>) -> SweepReport {
        let expired: Vec<AuctionId> = self
            .cache
            .active()
            .filter(|a| a.end_time <= now)
            .map(|a| a.id.clone())
            .collect();

        let mut report = SweepReport::default();
        for id in expired {
            match self.end_auction(&id, now).await {
                Ok(_) => report.ended.push(id),
                Err(e) => {
                    warn!(auction = %id, error = %e, "sweep failed to end auction");
                    report.failed.push(id);
                }
            }
        }
        report
    }

    async fn owned_neighbor_count(
        &self,
        territory: &Territory,
        bidder_id: &str,
    ) -> Result<u32, MarketError> {
        let mut owned = 0;
        for neighbor_id in self.store.neighbors(&territory.id).await? {
            if let Some(neighbor) = self.store.territory(&neighbor_id).await?
                && neighbor.owner_id.as_deref() == Some(bidder_id)
            {
                owned += 1;
            }
        }
        Ok(owned)
    }

    async fn require_territory(
        &self,
        territory_id: &TerritoryId,
    ) -> Result<Territory, MarketError> {
        let territory = self
            .store
            .territory(territory_id)
            .await?
            .ok_or_else(|| MarketError::TerritoryNotFound(territory_id.clone()))?;
        // the id type guarantees a country code, but denormalized records
        // imported from legacy backends may carry junk in the copy
        if territory.country.len() != 3
            || !territory.country.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(MarketError::MissingCountryContext(territory.country.clone()));
        }
        Ok(territory)
    }

    async fn ensure_no_auction(&self, territory: &Territory) -> Result<(), MarketError> {
        if self.cache.has_active_for(&territory.id)
            || territory.current_auction.is_some()
            || self.store.active_auction_for(&territory.id).await?.is_some()
        {
            return Err(MarketError::AuctionInProgress(territory.id.clone()));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_auction(
        &self,
        territory: &Territory,
        kind: AuctionKind,
        options: CreateAuctionOptions,
        starting_bid: i64,
        now: DateTime<Utc>,
        end_time: DateTime<Utc>,
        runs_during_protection: bool,
    ) -> Auction {
        Auction {
            id: AuctionId::new(&territory.id, now),
            territory_id: territory.id.clone(),
            territory_name: territory.name.clone(),
            country: territory.country.clone(),
            kind,
            status: AuctionStatus::Active,
            starting_bid,
            current_bid: starting_bid,
            min_increment: options.min_increment.unwrap_or(self.config.min_increment),
            highest_bidder: None,
            highest_bidder_name: None,
            bids: Vec::new(),
            start_time: now,
            end_time,
            protection_term: options.protection_term,
            runs_during_protection,
            prior_owner: territory.owner_id.clone(),
            prior_owner_name: territory.owner_name.clone(),
            prior_sovereignty: territory.sovereignty,
        }
    }

    async fn persist_new_auction(
        &mut self,
        auction: Auction,
        mut territory: Territory,
    ) -> Result<Auction, MarketError> {
        territory.current_auction = Some(auction.id.clone());
        if territory.sovereignty == Sovereignty::Unconquered {
            territory.sovereignty = Sovereignty::Contested;
        }
        self.store.insert_auction(&auction, &territory).await?;

        self.cache.apply(auction.clone());
        self.signals.push(MarketSignal::AuctionStarted {
            auction_id: auction.id.clone(),
            territory_id: auction.territory_id.clone(),
            starting_bid: auction.starting_bid,
            end_time: auction.end_time,
        });
        Ok(auction)
    }
}

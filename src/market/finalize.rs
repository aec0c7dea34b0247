//! The one-shot finalization decision.
//!
//! `plan_finalization` is pure; both store implementations call it inside
//! their transaction after re-reading the live auction and territory, so
//! the same rules hold no matter which backend commits the outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Auction, AuctionKind, AuctionStatus, Sovereignty, Territory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizationPlan {
    /// The auction was already terminal; no effects to apply.
    AlreadyEnded,
    /// Standard auction won: ownership transfers and protection starts.
    TransferOwnership {
        winner_id: String,
        winner_name: String,
        amount: i64,
        protection_until: DateTime<Utc>,
    },
    /// Extension auction won: the protection window lengthens from the
    /// later of now or the current expiry; ownership untouched.
    ExtendProtection {
        winner_id: String,
        winner_name: String,
        amount: i64,
        new_expiry: DateTime<Utc>,
    },
    /// The live owner diverged from the auction's recorded prior owner;
    /// someone else took title through a separate path. True ownership is
    /// left untouched; the auction still ends.
    SkipDivergedOwnership,
    /// No bids: the territory reverts to its prior owner and sovereignty.
    Revert,
}

/// Decide what ending this auction does to its territory.
pub fn plan_finalization(
    auction: &Auction,
    territory: &Territory,
    now: DateTime<Utc>,
) -> FinalizationPlan {
    if auction.status.is_terminal() {
        return FinalizationPlan::AlreadyEnded;
    }

    let Some(winner_id) = auction.highest_bidder.clone() else {
        return FinalizationPlan::Revert;
    };

    if territory.owner_id != auction.prior_owner {
        return FinalizationPlan::SkipDivergedOwnership;
    }

    let winner_name = auction.highest_bidder_name.clone().unwrap_or_default();
    let amount = auction.current_bid;
    match auction.kind {
        AuctionKind::Standard => FinalizationPlan::TransferOwnership {
            winner_id,
            winner_name,
            amount,
            protection_until: auction.protection_term.expiry_from(now),
        },
        AuctionKind::ProtectionExtension => {
            let base = territory.protection_until.map_or(now, |until| until.max(now));
            FinalizationPlan::ExtendProtection {
                winner_id,
                winner_name,
                amount,
                new_expiry: base + auction.protection_term.duration(),
            }
        }
    }
}

/// Apply a plan to the auction and territory records. Idempotent through the
/// `AlreadyEnded` guard: once the auction is terminal, re-application is a
/// no-op.
pub fn apply_plan(plan: &FinalizationPlan, auction: &mut Auction, territory: &mut Territory) {
    if matches!(plan, FinalizationPlan::AlreadyEnded) {
        return;
    }

    auction.status = AuctionStatus::Ended;
    if territory.current_auction.as_ref() == Some(&auction.id) {
        territory.current_auction = None;
    }

    match plan {
        FinalizationPlan::AlreadyEnded => unreachable!(),
        FinalizationPlan::TransferOwnership {
            winner_id,
            winner_name,
            protection_until,
            ..
        } => {
            territory.owner_id = Some(winner_id.clone());
            territory.owner_name = Some(winner_name.clone());
            territory.sovereignty = Sovereignty::Protected;
            territory.protection_until = Some(*protection_until);
        }
        FinalizationPlan::ExtendProtection { new_expiry, .. } => {
            territory.protection_until = Some(*new_expiry);
        }
        FinalizationPlan::SkipDivergedOwnership => {}
        FinalizationPlan::Revert => {
            territory.owner_id = auction.prior_owner.clone();
            territory.owner_name = auction.prior_owner_name.clone();
            territory.sovereignty = auction.prior_sovereignty;
        }
    }
}

/// Result of one finalization transaction: the plan that was applied plus
/// the records as committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalization {
    pub plan: FinalizationPlan,
    pub auction: Auction,
    pub territory: Territory,
}

impl Finalization {
    pub fn already_ended(&self) -> bool {
        matches!(self.plan, FinalizationPlan::AlreadyEnded)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::id::{AuctionId, TerritoryId};
    use crate::model::{Bid, ProtectionTerm};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 28, 12, 0, 0).unwrap()
    }

    fn fixture(kind: AuctionKind) -> (Auction, Territory) {
        let tid = TerritoryId::new("USA", "06075").unwrap();
        let territory = Territory::unconquered(tid.clone(), "San Francisco");
        let start = now() - Duration::hours(25);
        let auction = Auction {
            id: AuctionId::new(&tid, start),
            territory_id: tid,
            territory_name: "San Francisco".into(),
            country: "USA".into(),
            kind,
            status: AuctionStatus::Active,
            starting_bid: 100,
            current_bid: 100,
            min_increment: 1,
            highest_bidder: None,
            highest_bidder_name: None,
            bids: Vec::new(),
            start_time: start,
            end_time: now() - Duration::hours(1),
            protection_term: ProtectionTerm::Week,
            runs_during_protection: false,
            prior_owner: None,
            prior_owner_name: None,
            prior_sovereignty: Sovereignty::Unconquered,
        };
        (auction, territory)
    }

    fn win(auction: &mut Auction, bidder: &str, amount: i64) {
        auction.highest_bidder = Some(bidder.to_string());
        auction.highest_bidder_name = Some(bidder.to_uppercase());
        auction.current_bid = amount;
        auction.bids.push(Bid {
            bidder_id: bidder.to_string(),
            bidder_name: bidder.to_uppercase(),
            amount,
            effective_amount: amount,
            placed_at: auction.start_time,
        });
    }

    #[test]
    fn terminal_auction_plans_already_ended() {
        let (mut auction, territory) = fixture(AuctionKind::Standard);
        auction.status = AuctionStatus::Ended;
        assert_eq!(
            plan_finalization(&auction, &territory, now()),
            FinalizationPlan::AlreadyEnded
        );
    }

    #[test]
    fn standard_win_transfers_and_protects() {
        let (mut auction, mut territory) = fixture(AuctionKind::Standard);
        territory.sovereignty = Sovereignty::Contested;
        territory.current_auction = Some(auction.id.clone());
        win(&mut auction, "u1", 150);

        let plan = plan_finalization(&auction, &territory, now());
        apply_plan(&plan, &mut auction, &mut territory);

        assert_eq!(auction.status, AuctionStatus::Ended);
        assert_eq!(territory.owner_id.as_deref(), Some("u1"));
        assert_eq!(territory.sovereignty, Sovereignty::Protected);
        assert_eq!(
            territory.protection_until,
            Some(now() + Duration::days(7))
        );
        assert!(territory.current_auction.is_none());
    }

    #[test]
    fn no_bids_reverts_to_prior_state() {
        let (mut auction, mut territory) = fixture(AuctionKind::Standard);
        territory.sovereignty = Sovereignty::Contested;
        territory.current_auction = Some(auction.id.clone());

        let plan = plan_finalization(&auction, &territory, now());
        assert_eq!(plan, FinalizationPlan::Revert);
        apply_plan(&plan, &mut auction, &mut territory);

        assert_eq!(auction.status, AuctionStatus::Ended);
        assert_eq!(territory.sovereignty, Sovereignty::Unconquered);
        assert!(territory.owner_id.is_none());
        assert!(territory.current_auction.is_none());
    }

    #[test]
    fn no_bids_restores_prior_owner() {
        let (mut auction, mut territory) = fixture(AuctionKind::Standard);
        auction.prior_owner = Some("old".into());
        auction.prior_owner_name = Some("OLD".into());
        auction.prior_sovereignty = Sovereignty::Ruled;
        territory.owner_id = Some("old".into());
        territory.owner_name = Some("OLD".into());
        territory.sovereignty = Sovereignty::Ruled;
        territory.current_auction = Some(auction.id.clone());

        let plan = plan_finalization(&auction, &territory, now());
        apply_plan(&plan, &mut auction, &mut territory);

        assert_eq!(territory.owner_id.as_deref(), Some("old"));
        assert_eq!(territory.sovereignty, Sovereignty::Ruled);
    }

    #[test]
    fn diverged_ownership_skips_transfer_but_still_ends() {
        let (mut auction, mut territory) = fixture(AuctionKind::Standard);
        win(&mut auction, "u1", 150);
        // someone else took title through a separate path mid-auction
        territory.owner_id = Some("interloper".into());
        territory.sovereignty = Sovereignty::Ruled;
        territory.current_auction = Some(auction.id.clone());

        let plan = plan_finalization(&auction, &territory, now());
        assert_eq!(plan, FinalizationPlan::SkipDivergedOwnership);
        apply_plan(&plan, &mut auction, &mut territory);

        assert_eq!(auction.status, AuctionStatus::Ended);
        assert_eq!(territory.owner_id.as_deref(), Some("interloper"));
        assert!(territory.current_auction.is_none());
    }

    #[test]
    fn extension_win_lengthens_without_transfer() {
        let (mut auction, mut territory) = fixture(AuctionKind::ProtectionExtension);
        auction.protection_term = ProtectionTerm::Month;
        auction.prior_owner = Some("owner".into());
        win(&mut auction, "owner", 200);
        territory.owner_id = Some("owner".into());
        territory.owner_name = Some("OWNER".into());
        territory.sovereignty = Sovereignty::Protected;
        let existing = now() + Duration::days(3);
        territory.protection_until = Some(existing);
        territory.current_auction = Some(auction.id.clone());

        let plan = plan_finalization(&auction, &territory, now());
        apply_plan(&plan, &mut auction, &mut territory);

        // extends from the later of now/current expiry, never replaces
        assert_eq!(
            territory.protection_until,
            Some(existing + Duration::days(30))
        );
        assert_eq!(territory.owner_id.as_deref(), Some("owner"));
        assert_eq!(territory.sovereignty, Sovereignty::Protected);
    }

    #[test]
    fn lapsed_extension_extends_from_now() {
        let (mut auction, mut territory) = fixture(AuctionKind::ProtectionExtension);
        auction.protection_term = ProtectionTerm::Week;
        auction.prior_owner = Some("owner".into());
        win(&mut auction, "owner", 50);
        territory.owner_id = Some("owner".into());
        territory.sovereignty = Sovereignty::Protected;
        territory.protection_until = Some(now() - Duration::days(10));
        territory.current_auction = Some(auction.id.clone());

        let plan = plan_finalization(&auction, &territory, now());
        apply_plan(&plan, &mut auction, &mut territory);

        assert_eq!(
            territory.protection_until,
            Some(now() + Duration::days(7))
        );
    }

    #[test]
    fn apply_plan_is_idempotent_through_terminal_guard() {
        let (mut auction, mut territory) = fixture(AuctionKind::Standard);
        territory.current_auction = Some(auction.id.clone());
        win(&mut auction, "u1", 150);

        let plan = plan_finalization(&auction, &territory, now());
        apply_plan(&plan, &mut auction, &mut territory);
        let after_first = (auction.clone(), territory.clone());

        // a second finalization must observe AlreadyEnded and change nothing
        let second = plan_finalization(&auction, &territory, now() + Duration::hours(5));
        assert_eq!(second, FinalizationPlan::AlreadyEnded);
        apply_plan(&second, &mut auction, &mut territory);
        assert_eq!((auction, territory), after_first);
    }
}

pub mod buffs;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod integrity;
pub mod pricing;
pub mod signal;

pub use buffs::{AppliedBuff, BuffedAmount, CountryHoldings, compute_effective_amount};
pub use cache::AuctionCache;
pub use config::MarketConfig;
pub use engine::{AuctionEngine, BidReceipt, CreateAuctionOptions, SweepReport};
pub use error::MarketError;
pub use finalize::{Finalization, FinalizationPlan, apply_plan, plan_finalization};
pub use integrity::{AuctionRepair, reconcile};
pub use pricing::{FixedPriceOracle, PricingOracle, canonical_starting_bid};
pub use signal::MarketSignal;

pub mod db;
pub mod id;
pub mod market;
pub mod model;
pub mod store;

pub use id::{AuctionId, TerritoryId};
pub use market::{
    AuctionEngine, CreateAuctionOptions, FixedPriceOracle, MarketConfig, MarketError,
    MarketSignal, PricingOracle,
};
pub use model::{
    Auction, AuctionKind, AuctionStatus, Bid, ProtectionTerm, Sovereignty, Territory,
};
pub use store::{AuctionStore, MemoryStore};
